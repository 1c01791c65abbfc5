mod api;
mod calendar;
mod cli;
mod commands;
mod config;
mod logging;
mod model;
mod storage;
mod ui;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let ctx = commands::AppContext::load()?;
    let _logger = match logging::init_logging(&ctx.config.log_level, &ctx.paths.logs) {
        Ok(handle) => Some(handle),
        Err(err) => {
            eprintln!("warning: logging disabled: {:#}", err);
            None
        }
    };

    let command = args.command.unwrap_or(cli::Command::Tui);
    match command {
        cli::Command::Register { username } => commands::register(&ctx, username),
        cli::Command::Login { username } => commands::login(&ctx, username),
        cli::Command::Logout => commands::logout(&ctx),
        cli::Command::Month { month, hide } => commands::month(&ctx, month, hide),
        cli::Command::Day { date, hide } => commands::day(&ctx, date, hide),
        cli::Command::Add {
            title,
            date,
            time,
            description,
            category,
        } => commands::add(&ctx, title, date, time, description, category),
        cli::Command::Edit {
            task_id,
            title,
            description,
            date,
            time,
            category,
            clear_category,
        } => commands::edit(
            &ctx,
            task_id,
            title,
            description,
            date,
            time,
            category,
            clear_category,
        ),
        cli::Command::Delete { task_id } => commands::delete(&ctx, task_id),
        cli::Command::Done { task_id } => commands::done(&ctx, task_id),
        cli::Command::Categories => commands::categories(&ctx),
        cli::Command::CategoryAdd { name, color } => commands::category_add(&ctx, name, color),
        cli::Command::Tui => commands::tui(&ctx),
    }
}
