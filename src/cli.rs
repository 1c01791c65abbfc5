use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "taskcal", version, about = "Terminal task calendar")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create an account and log in
    Register {
        #[arg(long, short = 'u')]
        username: String,
    },
    /// Log in to an existing account
    Login {
        #[arg(long, short = 'u')]
        username: String,
    },
    /// Forget the stored session
    Logout,
    /// Print the month grid
    Month {
        /// Month to show (YYYY-MM), defaults to the current month
        #[arg(long)]
        month: Option<String>,
        /// Hide a category id (repeatable)
        #[arg(long = "hide")]
        hide: Vec<i64>,
    },
    /// List the tasks on one day
    Day {
        /// Day to show (YYYY-MM-DD), defaults to today
        date: Option<String>,
        /// Hide a category id (repeatable)
        #[arg(long = "hide")]
        hide: Vec<i64>,
    },
    /// Add a task
    Add {
        /// Title of the task
        title: String,
        /// Day in YYYY-MM-DD format
        #[arg(long)]
        date: String,
        /// Time in HH:MM format
        #[arg(long)]
        time: String,
        #[arg(long)]
        description: Option<String>,
        /// Category id
        #[arg(long)]
        category: Option<i64>,
    },
    /// Edit an existing task
    Edit {
        task_id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// New day (YYYY-MM-DD), requires --time
        #[arg(long, requires = "time")]
        date: Option<String>,
        /// New time (HH:MM), requires --date
        #[arg(long, requires = "date")]
        time: Option<String>,
        /// New category id
        #[arg(long, conflicts_with = "clear_category")]
        category: Option<i64>,
        /// Remove the category
        #[arg(long)]
        clear_category: bool,
    },
    /// Delete a task
    Delete { task_id: i64 },
    /// Toggle a task between done and not done
    Done { task_id: i64 },
    /// List categories
    Categories,
    /// Create a category
    CategoryAdd {
        name: String,
        /// CSS color, e.g. #10b981
        #[arg(long)]
        color: Option<String>,
    },
    /// Launch the interactive calendar
    Tui,
}
