use crate::known_errors::KnownErrors;
use cuid::{Cuid2Constructor, cuid2_slug, is_cuid2};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};

/// A cuid2 identifier stored inline so ids stay `Copy`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Ident {
    Ident10([u8; 10]),
    Ident16([u8; 16]),
}

impl Ident {
    pub fn new10() -> Self {
        let slug = cuid2_slug();
        match slug.as_bytes().try_into() {
            Ok(bytes) => Self::Ident10(bytes),
            // the slug length is fixed by the cuid crate, fall back to the long form otherwise
            Err(_) => Self::new16(),
        }
    }

    pub fn new16() -> Self {
        let mut bytes = [b'a'; 16];
        let id = Cuid2Constructor::new().with_length(16).create_id();
        for (slot, byte) in bytes.iter_mut().zip(id.bytes()) {
            *slot = byte;
        }
        Self::Ident16(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Ident::Ident10(id) => id.as_ref(),
            Ident::Ident16(id) => id.as_ref(),
        }
    }
}

impl FromStr for Ident {
    type Err = KnownErrors;

    fn from_str(s: &str) -> Result<Self, KnownErrors> {
        if !is_cuid2(s) {
            return Err(KnownErrors::InvalidId);
        }
        match s.len() {
            10 => Ok(Self::Ident10(
                s.as_bytes().try_into().map_err(|_| KnownErrors::InvalidId)?,
            )),
            16 => Ok(Self::Ident16(
                s.as_bytes().try_into().map_err(|_| KnownErrors::InvalidId)?,
            )),
            _ => Err(KnownErrors::InvalidId),
        }
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = std::str::from_utf8(self.as_bytes()).map_err(|_| fmt::Error)?;
        f.write_str(s)
    }
}

impl Serialize for Ident {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Ident {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ident::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Declares a typed id backed by [`Ident`], generated with the given constructor.
#[macro_export]
macro_rules! id {
    ($name:ident, $generator:expr) => {
        #[derive(
            Clone,
            Copy,
            Debug,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name($crate::ident::Ident);

        impl $name {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($generator)
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::known_errors::KnownErrors;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(<$crate::ident::Ident as std::str::FromStr>::from_str(s)?))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

id!(SampleId, Ident::new10());
id!(CourseId, Ident::new10());
id!(LessonId, Ident::new10());
