//! UI utilities for pretty printing

use colored::Colorize;

pub fn print_help() {
    println!();
    println!("{}", "Available Commands:".bright_cyan().bold());
    println!();
    println!("  {:<30} {}", "help".bright_green(), "Show this help message");
    println!("  {:<30} {}", "quit, exit".bright_green(), "Exit the application");
    println!();
    println!("  {}", "Profile:".bright_yellow().bold());
    println!("  {:<30} {}", "whoami".bright_green(), "Show current user info");
    println!("  {:<30} {}", "name <display name>".bright_green(), "Change your display name");
    println!("  {:<30} {}", "email <address>".bright_green(), "Set your email");
    println!("  {:<30} {}", "verify <address>".bright_green(), "Verify your email");
    println!("  {:<30} {}", "users".bright_green(), "List known users");
    println!();
    println!("  {}", "Groups:".bright_yellow().bold());
    println!("  {:<30} {}", "groups".bright_green(), "List spending groups");
    println!("  {:<30} {}", "group create <name>".bright_green(), "Create a group");
    println!("  {:<30} {}", "group <name|number>".bright_green(), "Switch to a group");
    println!("  {:<30} {}", "group delete".bright_green(), "Delete the current group");
    println!("  {:<30} {}", "rename <name>".bright_green(), "Rename the current group");
    println!("  {:<30} {}", "members".bright_green(), "List members of the current group");
    println!("  {:<30} {}", "member add <name>".bright_green(), "Add a member");
    println!("  {:<30} {}", "member remove <name>".bright_green(), "Remove a member");
    println!();
    println!("  {}", "Spendings:".bright_yellow().bold());
    println!("  {:<30} {}", "spend <amount> <title>".bright_green(), "Record a spending, split evenly");
    println!("  {:<30} {}", "spendings".bright_green(), "List spendings, newest first");
    println!("  {:<30} {}", "delete <spending id>".bright_green(), "Delete a spending");
    println!("  {:<30} {}", "balances".bright_green(), "Show who owes whom");
    println!();
    println!("  {}", "Info:".bright_yellow().bold());
    println!("  {:<30} {}", "context".bright_green(), "Show current context");
    println!("  {:<30} {}", "log".bright_green(), "Show the operation log");
    println!("  {:<30} {}", "sync".bright_green(), "Show sync status");
    println!("  {:<30} {}", "version".bright_green(), "Show version and build info");
    println!();
}

pub fn print_error(msg: &str) {
    println!("{} {}", "✗".bright_red(), msg.red());
}

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".bright_green(), msg.bright_green());
}

pub fn print_info(msg: &str) {
    println!("{} {}", "ℹ".bright_blue(), msg);
}

pub fn print_warning(msg: &str) {
    println!("{} {}", "⚠".bright_yellow(), msg.yellow());
}
