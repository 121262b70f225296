use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use shuttlecache_core::models::{MasterType, ScheduleFilter};

#[derive(Parser)]
#[command(name = "shuttle")]
#[command(about = "Pickup and dropoff tracking for care-facility shuttles, usable offline")]
#[command(version, propagate_version = true)]
pub struct Cli {
    /// Do not touch the network; changes are queued until the next sync
    #[arg(long, global = true)]
    pub offline: bool,

    /// Directory holding local state (defaults to the platform data dir)
    #[arg(long, global = true, env = "SHUTTLE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show or change configuration
    Config(ConfigArgs),

    /// Fetch masters and today's schedule
    Init {
        /// Load everything an admin needs (courses and users too)
        #[arg(long)]
        admin: bool,
    },

    /// Choose facility, vehicle, date and crew. Without flags, shows them.
    Setup(SetupArgs),

    /// List vehicles of the current facility
    Vehicles {
        /// Include vehicles of every facility
        #[arg(long)]
        all: bool,
    },

    /// Show the current vehicle's rides
    #[command(alias = "ls")]
    Schedule {
        /// all, pickup, dropoff or unfinished
        #[arg(short, long, default_value = "all", value_parser = parse_filter)]
        filter: ScheduleFilter,

        /// Fetch the schedule before showing it
        #[arg(short, long)]
        refresh: bool,
    },

    /// Toggle a ride between done and not done
    Check {
        schedule_id: String,
    },

    /// Set a ride's status (boarded, alighted, absent, cancelled or none)
    Status {
        schedule_id: String,
        status: String,
        #[arg(short, long)]
        note: Option<String>,
    },

    /// Deliver queued check-ins
    Sync {
        /// Keep running, syncing whenever the backend is reachable
        #[arg(short, long)]
        watch: bool,

        /// Seconds between connectivity checks when watching
        #[arg(short, long, default_value_t = 30)]
        interval: u64,
    },

    /// List check-ins waiting for delivery
    Pending,

    /// Show backend version information
    ApiInfo,

    /// Office tools
    #[command(subcommand)]
    Admin(AdminCommand),
}

#[derive(Args)]
pub struct ConfigArgs {
    #[arg(long)]
    pub api_url: Option<String>,

    #[arg(long)]
    pub default_facility: Option<String>,

    #[arg(long)]
    pub offline_mode: Option<bool>,

    #[arg(long)]
    pub log_to_file: Option<bool>,
}

#[derive(Args)]
pub struct SetupArgs {
    #[arg(long)]
    pub facility: Option<String>,

    #[arg(long)]
    pub vehicle: Option<String>,

    /// today, tomorrow, yesterday or YYYY-MM-DD
    #[arg(long)]
    pub date: Option<String>,

    #[arg(long)]
    pub driver: Option<String>,

    #[arg(long)]
    pub attendant: Option<String>,
}

#[derive(Subcommand)]
pub enum AdminCommand {
    /// Progress of each course for the current date
    Status {
        #[arg(short, long)]
        refresh: bool,
    },

    /// List templates
    Templates {
        #[arg(long)]
        course: Option<String>,
    },

    /// Edit one course's schedule for the current date
    #[command(subcommand)]
    Edit(EditCommand),

    /// Expand templates into the schedule for the current date
    Register {
        #[arg(required = true)]
        template_ids: Vec<String>,

        #[arg(long)]
        vehicle: Option<String>,
    },

    /// Maintain master tables
    #[command(subcommand)]
    Master(MasterCommand),
}

#[derive(Subcommand)]
pub enum EditCommand {
    /// Start editing a course from the loaded schedule
    Open { course_id: String },
    /// Show the draft rows
    Show,
    /// Replace the drafts with a template's stops
    Template { template_id: String },
    /// Append an empty row
    Add,
    /// Remove a row (1-based)
    Remove { row: usize },
    /// Change a row: field is time, type, user or vehicle
    Set {
        row: usize,
        field: String,
        value: String,
    },
    /// Overwrite the course's schedule with the drafts
    Save,
    /// Save the drafts as a new template
    SaveTemplate { name: String },
    /// Throw the drafts away
    Discard,
}

#[derive(Subcommand)]
pub enum MasterCommand {
    /// Show a master table
    List {
        #[arg(value_parser = parse_master)]
        master: MasterType,
    },
    /// Add a row, e.g. `add vehicle 車両名=2号車 定員=8`
    Add {
        #[arg(value_parser = parse_master)]
        master: MasterType,
        #[arg(value_parser = parse_assignment)]
        values: Vec<(String, String)>,
    },
    /// Change a saved row. Rows are never deleted; set 有効=false to retire one
    Set {
        #[arg(value_parser = parse_master)]
        master: MasterType,
        id: String,
        #[arg(required = true, value_parser = parse_assignment)]
        values: Vec<(String, String)>,
    },
}

fn parse_filter(s: &str) -> Result<ScheduleFilter, String> {
    s.parse()
}

fn parse_master(s: &str) -> Result<MasterType, String> {
    s.parse()
}

fn parse_assignment(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))
}
