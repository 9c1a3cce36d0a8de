use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use jobtrack::models::JobSearchParams;

#[derive(Parser, Debug)]
#[command(name = "jobtrack")]
#[command(about = "Job search cache and usage limits for the job seeker app", version)]
pub struct Cli {
    /// Overrides JOBTRACK_STORE_PATH.
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Search jobs, serving repeats from the cache. Rate limits apply per
    /// process; the cache persists across runs.
    Search(SearchArgs),
    /// Show remaining quota for a user. Counters live in memory, so this
    /// only reflects calls made by the current process.
    Usage(UserArgs),
    /// Show job search cache statistics
    CacheStats,
    /// Drop every cached job search
    CacheClear,
    /// Load a user's profile
    Profile {
        #[arg(long)]
        user: String,
    },
    /// Remove every cached entry for a user
    ForgetUser {
        #[arg(long)]
        user: String,
    },
}

#[derive(Args, Debug)]
pub struct UserArgs {
    #[arg(long)]
    pub user: String,

    #[arg(long, default_value_t = false)]
    pub pro: bool,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub location: Option<String>,

    #[arg(long)]
    pub country: Option<String>,

    #[arg(long)]
    pub limit: Option<u32>,

    /// Max listing age in days
    #[arg(long)]
    pub date_posted: Option<String>,

    /// Searches without a user skip the rate limit
    #[arg(long)]
    pub user: Option<String>,

    #[arg(long, default_value_t = false)]
    pub pro: bool,
}

impl SearchArgs {
    pub fn params(&self) -> JobSearchParams {
        JobSearchParams {
            country: self.country.clone(),
            title: self.title.clone(),
            location: self.location.clone(),
            limit: self.limit,
            date_posted: self.date_posted.clone(),
        }
    }
}
