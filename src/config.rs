use crate::course::candidate::DEFAULT_LOOKUP_TIMEOUT;
use crate::course::candidate::DEFAULT_LOOKUP_URL;
use clap::Parser;
use std::time::Duration;
use url::Url;

/// CourseSphere access-control API server
#[derive(Parser, Debug, Clone)]
#[command(name = "coursesphere")]
pub struct Config {
    /// Bind address
    #[arg(long, env = "SITE_ADDR", default_value = "0.0.0.0:3000")]
    pub site_addr: String,

    /// HS256 secret the bearer tokens are signed with
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    /// Endpoint consulted before a user is added as course instructor
    #[arg(long, env = "CANDIDATE_LOOKUP_URL", default_value = DEFAULT_LOOKUP_URL)]
    pub candidate_lookup_url: Url,

    #[arg(long, env = "CANDIDATE_LOOKUP_TIMEOUT_SECS", default_value_t = DEFAULT_LOOKUP_TIMEOUT.as_secs())]
    pub candidate_lookup_timeout_secs: u64,

    /// Create the development users on boot
    #[arg(long, env = "SEED_DEV_DATA")]
    pub seed_dev_data: bool,
}

impl Config {
    pub fn candidate_lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.candidate_lookup_timeout_secs)
    }
}
