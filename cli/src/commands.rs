//! Command handler for CLI

use crate::account::Account;
use crate::ui;
use anyhow::{bail, Context, Result};
use chrono::{TimeZone, Utc};
use colored::Colorize;
use tally_core::operation::*;
use tally_core::{
    Engine, Origin, Share, SpendingGroupId, SpendingId, State, Subscription, Update, UserId,
};

pub struct CommandHandler {
    engine: Engine,
    account: Account,
    updates: Subscription<Update>,
    current_group: Option<SpendingGroupId>,
}

impl CommandHandler {
    pub fn new(engine: Engine, account: Account) -> Self {
        let updates = engine.subscribe();
        Self {
            engine,
            account,
            updates,
            current_group: None,
        }
    }

    /// Create the local sandbox user on first run
    pub async fn ensure_user(&mut self) -> Result<()> {
        if self.engine.state().user(&self.account.user_id).is_none() {
            self.submit(OperationPayload::CreateSandboxUser(CreateSandboxUser {
                user_id: self.account.user_id.clone(),
                display_name: self.account.username.clone(),
            }))
            .await?;
            ui::print_success(&format!("Created local user {}", self.account.username));
        }
        Ok(())
    }

    pub fn prompt(&self) -> String {
        let state = self.engine.state();
        match self.current_group.as_ref().and_then(|id| state.spending_group(id)) {
            Some(group) => format!("{}@{}", self.account.username, group.name),
            None => self.account.username.clone(),
        }
    }

    pub async fn handle_command(&mut self, input: &str) -> Result<()> {
        let parts: Vec<&str> = input.split_whitespace().collect();
        if parts.is_empty() {
            return Ok(());
        }

        let result = match parts[0] {
            "whoami" => self.cmd_whoami(),
            "version" | "about" => self.cmd_version(),
            "context" => self.cmd_context(),
            "name" => self.cmd_name(&parts[1..].join(" ")).await,
            "email" => self.cmd_email(&parts[1..]).await,
            "verify" => self.cmd_verify(&parts[1..]).await,
            "users" => self.cmd_users(),
            "groups" => self.cmd_groups(),
            "group" => self.cmd_group(&parts[1..]).await,
            "rename" => self.cmd_rename(&parts[1..].join(" ")).await,
            "members" => self.cmd_members(),
            "member" => self.cmd_member(&parts[1..]).await,
            "spend" => self.cmd_spend(&parts[1..]).await,
            "spendings" => self.cmd_spendings(),
            "delete" => self.cmd_delete(&parts[1..]).await,
            "balances" => self.cmd_balances(),
            "log" => self.cmd_log().await,
            "sync" => self.cmd_sync(),
            "help" => {
                ui::print_help();
                Ok(())
            }
            _ => {
                ui::print_error(&format!("Unknown command: {}", parts[0]));
                ui::print_info("Type 'help' for available commands");
                Ok(())
            }
        };

        self.report_updates();
        result
    }

    async fn submit(&self, payload: OperationPayload) -> Result<()> {
        self.engine
            .submit(vec![payload])
            .await
            .context("Failed to record operation")?;
        Ok(())
    }

    fn report_updates(&mut self) {
        while let Ok(update) = self.updates.try_recv() {
            let origin = match update.origin {
                Origin::Local => "local",
                Origin::Remote => "remote",
            };
            for operation in update.operations.iter() {
                println!(
                    "  {} {} {}",
                    "↳".dimmed(),
                    operation.payload.kind().dimmed(),
                    format!("({})", origin).dimmed()
                );
            }
        }
    }

    fn current_group(&self) -> Result<SpendingGroupId> {
        match &self.current_group {
            Some(id) => Ok(id.clone()),
            None => bail!("No group selected. Use 'group <name>' first"),
        }
    }

    fn cmd_version(&self) -> Result<()> {
        println!();
        println!("{}", "=".repeat(60).bright_blue());
        println!("{}", format!("  {}", tally_core::version::version_string()).bright_cyan().bold());
        println!("{}", "=".repeat(60).bright_blue());
        println!();
        println!("{} {}", "Schema Version:".bright_green(), tally_core::version::SCHEMA_VERSION);
        println!("{} {}", "Build:".bright_green(), tally_core::version::BUILD_PROFILE);
        println!();
        Ok(())
    }

    fn cmd_whoami(&self) -> Result<()> {
        let state = self.engine.state();
        println!();
        println!("{} {}", "Username:".bright_green(), self.account.username.bright_cyan());
        println!("{} {}", "User ID:".bright_green(), self.account.user_id);
        println!("{} {}", "Device:".bright_green(), self.account.device_id);
        if let Some(user) = state.user(&self.account.user_id) {
            let kind = if user.is_sandbox() { "sandbox" } else { "registered" };
            println!("{} {} ({})", "Display name:".bright_green(), user.display_name(), kind);
        }
        if let Some(profile) = state.profile() {
            let email = profile.email.as_deref().unwrap_or("-");
            let verified = if profile.email_verified { "verified" } else { "unverified" };
            println!("{} {} ({})", "Email:".bright_green(), email, verified);
        }
        println!();
        Ok(())
    }

    fn cmd_context(&self) -> Result<()> {
        let state = self.engine.state();
        println!();
        match self.current_group.as_ref().and_then(|id| state.spending_group(id)) {
            Some(group) => println!("{} {} ({})", "Group:".bright_green(), group.name, group.id),
            None => println!("{} {}", "Group:".bright_green(), "none".dimmed()),
        }
        println!("{} {:?}", "Session:".bright_green(), self.engine.mode());
        println!();
        Ok(())
    }

    async fn cmd_name(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            bail!("Usage: name <display name>");
        }
        self.submit(OperationPayload::UpdateDisplayName(UpdateDisplayName {
            user_id: self.account.user_id.clone(),
            display_name: name.to_string(),
        }))
        .await?;
        ui::print_success(&format!("Display name set to {}", name));
        Ok(())
    }

    async fn cmd_email(&self, args: &[&str]) -> Result<()> {
        let [email] = args else {
            bail!("Usage: email <address>");
        };
        self.submit(OperationPayload::UpdateEmail(UpdateEmail {
            email: email.to_string(),
        }))
        .await?;
        ui::print_success(&format!("Email set to {}", email));
        Ok(())
    }

    async fn cmd_verify(&self, args: &[&str]) -> Result<()> {
        let [email] = args else {
            bail!("Usage: verify <address>");
        };
        self.submit(OperationPayload::VerifyEmail(VerifyEmail {
            email: email.to_string(),
        }))
        .await?;

        let verified = self
            .engine
            .state()
            .profile()
            .map(|profile| profile.email_verified)
            .unwrap_or(false);
        if verified {
            ui::print_success("Email verified");
        } else {
            ui::print_warning("Address does not match the current email, nothing verified");
        }
        Ok(())
    }

    fn cmd_users(&self) -> Result<()> {
        let state = self.engine.state();
        println!();
        for user in state.users() {
            let marker = if user.id() == &self.account.user_id { "*" } else { " " };
            println!("  {} {} {}", marker.bright_green(), user.display_name(), user.id().as_str().dimmed());
        }
        println!();
        Ok(())
    }

    fn cmd_groups(&self) -> Result<()> {
        let state = self.engine.state();
        let groups = state.spending_groups();
        println!();
        if groups.is_empty() {
            ui::print_info("No groups yet. Create one with 'group create <name>'");
        }
        for (index, group) in groups.iter().enumerate() {
            let current = self.current_group.as_ref() == Some(&group.id);
            let marker = if current { "*" } else { " " };
            println!(
                "  {} {:>2}. {} {} {}",
                marker.bright_green(),
                index + 1,
                group.name.bright_cyan(),
                format!("({} members)", state.members(&group.id).len()).dimmed(),
                group.id.as_str().dimmed()
            );
        }
        println!();
        Ok(())
    }

    async fn cmd_group(&mut self, args: &[&str]) -> Result<()> {
        match args {
            ["create", name @ ..] if !name.is_empty() => {
                let id = SpendingGroupId::generate();
                let name = name.join(" ");
                self.submit(OperationPayload::CreateSpendingGroup(CreateSpendingGroup {
                    group_id: id.clone(),
                    name: name.clone(),
                    member_ids: vec![self.account.user_id.clone()],
                }))
                .await?;
                self.current_group = Some(id);
                ui::print_success(&format!("Created group {}", name));
                Ok(())
            }
            ["delete"] => {
                let id = self.current_group()?;
                self.submit(OperationPayload::DeleteSpendingGroup(DeleteSpendingGroup {
                    group_id: id,
                }))
                .await?;
                self.current_group = None;
                ui::print_success("Group deleted");
                Ok(())
            }
            [] => bail!("Usage: group create <name> | group delete | group <name|number>"),
            selector => {
                let state = self.engine.state();
                let id = resolve_group(&state, &selector.join(" "))?;
                if let Some(group) = state.spending_group(&id) {
                    ui::print_success(&format!("Switched to {}", group.name));
                }
                self.current_group = Some(id);
                Ok(())
            }
        }
    }

    async fn cmd_rename(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            bail!("Usage: rename <new name>");
        }
        self.submit(OperationPayload::RenameSpendingGroup(RenameSpendingGroup {
            group_id: self.current_group()?,
            name: name.to_string(),
        }))
        .await?;
        ui::print_success(&format!("Group renamed to {}", name));
        Ok(())
    }

    fn cmd_members(&self) -> Result<()> {
        let group = self.current_group()?;
        let state = self.engine.state();
        println!();
        for member in state.members(&group) {
            let name = state
                .user(member)
                .map(|user| user.display_name().to_string())
                .unwrap_or_else(|| "(unknown user)".to_string());
            println!("  {} {}", name, member.as_str().dimmed());
        }
        println!();
        Ok(())
    }

    async fn cmd_member(&self, args: &[&str]) -> Result<()> {
        let group_id = self.current_group()?;
        match args {
            ["add", name @ ..] if !name.is_empty() => {
                let display_name = name.join(" ");
                let user_id = UserId::generate();
                self.engine
                    .submit(vec![
                        OperationPayload::CreateSandboxUser(CreateSandboxUser {
                            user_id: user_id.clone(),
                            display_name: display_name.clone(),
                        }),
                        OperationPayload::AddSpendingGroupMember(AddSpendingGroupMember {
                            group_id,
                            user_id,
                        }),
                    ])
                    .await
                    .context("Failed to add member")?;
                ui::print_success(&format!("Added {}", display_name));
                Ok(())
            }
            ["remove", name @ ..] if !name.is_empty() => {
                let state = self.engine.state();
                let user_id = resolve_member(&state, &group_id, &name.join(" "))?;
                self.submit(OperationPayload::RemoveSpendingGroupMember(
                    RemoveSpendingGroupMember { group_id, user_id },
                ))
                .await?;
                ui::print_success("Member removed");
                Ok(())
            }
            _ => bail!("Usage: member add <name> | member remove <name>"),
        }
    }

    async fn cmd_spend(&self, args: &[&str]) -> Result<()> {
        let [amount, title @ ..] = args else {
            bail!("Usage: spend <amount> <title>");
        };
        if title.is_empty() {
            bail!("Usage: spend <amount> <title>");
        }
        let group_id = self.current_group()?;
        let amount = parse_amount(amount)?;

        let state = self.engine.state();
        let mut members = state.members(&group_id).to_vec();
        if members.is_empty() {
            members.push(self.account.user_id.clone());
        }

        self.submit(OperationPayload::CreateSpending(CreateSpending {
            spending_id: SpendingId::generate(),
            group_id,
            title: title.join(" "),
            amount,
            currency: "EUR".to_string(),
            payer_id: self.account.user_id.clone(),
            shares: split_evenly(amount, &members),
            spent_at: Utc::now().timestamp_millis(),
        }))
        .await?;
        ui::print_success(&format!("Recorded {} split {} ways", format_amount(amount), members.len()));
        Ok(())
    }

    fn cmd_spendings(&self) -> Result<()> {
        let group = self.current_group()?;
        let state = self.engine.state();
        let spendings = state.spendings(&group);
        println!();
        if spendings.is_empty() {
            ui::print_info("No spendings in this group");
        }
        for spending in spendings {
            let payer = state
                .user(&spending.payer_id)
                .map(|user| user.display_name().to_string())
                .unwrap_or_else(|| spending.payer_id.to_string());
            let when = Utc
                .timestamp_millis_opt(spending.spent_at)
                .single()
                .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();
            println!(
                "  {} {:>10} {} {} {}",
                when.dimmed(),
                format!("{} {}", format_amount(spending.amount), spending.currency).bright_yellow(),
                spending.title,
                format!("paid by {}", payer).dimmed(),
                short_id(spending.id.as_str()).dimmed()
            );
        }
        println!();
        Ok(())
    }

    async fn cmd_delete(&self, args: &[&str]) -> Result<()> {
        let [prefix] = args else {
            bail!("Usage: delete <spending id>");
        };
        let group_id = self.current_group()?;
        let state = self.engine.state();
        let matches: Vec<&SpendingId> = state
            .spending_ids(&group_id)
            .iter()
            .filter(|id| id.as_str().starts_with(prefix))
            .collect();
        let spending_id = match matches.as_slice() {
            [id] => (*id).clone(),
            [] => bail!("No spending matches {}", prefix),
            _ => bail!("{} is ambiguous, type more of the id", prefix),
        };

        self.submit(OperationPayload::DeleteSpending(DeleteSpending {
            spending_id,
            group_id,
        }))
        .await?;
        ui::print_success("Spending deleted");
        Ok(())
    }

    fn cmd_balances(&self) -> Result<()> {
        let group = self.current_group()?;
        let state = self.engine.state();
        println!();
        for (user_id, balance) in state.balances(&group) {
            let name = state
                .user(&user_id)
                .map(|user| user.display_name().to_string())
                .unwrap_or_else(|| user_id.to_string());
            let amount = format_amount(balance);
            let amount = if balance >= 0 { amount.bright_green() } else { amount.bright_red() };
            println!("  {:<20} {:>12}", name, amount);
        }
        println!();
        Ok(())
    }

    async fn cmd_log(&self) -> Result<()> {
        let operations = self.engine.operations().await;
        println!();
        for operation in &operations {
            println!(
                "  {} {} {}",
                operation.created_at.to_string().dimmed(),
                operation.payload.kind().bright_cyan(),
                short_id(operation.id.as_str()).dimmed()
            );
        }
        ui::print_info(&format!("{} operations", operations.len()));
        Ok(())
    }

    fn cmd_sync(&self) -> Result<()> {
        let pending = self.engine.pending_sync()?;
        ui::print_info(&format!(
            "{:?} session, {} operations pending sync",
            self.engine.mode(),
            pending
        ));
        Ok(())
    }
}

fn short_id(id: &str) -> &str {
    &id[..id.len().min(8)]
}

fn resolve_group(state: &State, selector: &str) -> Result<SpendingGroupId> {
    let groups = state.spending_groups();
    if let Ok(number) = selector.parse::<usize>() {
        if let Some(group) = number.checked_sub(1).and_then(|index| groups.get(index)) {
            return Ok(group.id.clone());
        }
    }
    groups
        .iter()
        .find(|group| group.name.eq_ignore_ascii_case(selector) || group.id.as_str() == selector)
        .map(|group| group.id.clone())
        .with_context(|| format!("No group named {}", selector))
}

fn resolve_member(state: &State, group: &SpendingGroupId, selector: &str) -> Result<UserId> {
    state
        .members(group)
        .iter()
        .find(|id| {
            id.as_str() == selector
                || state
                    .user(id)
                    .map(|user| user.display_name().eq_ignore_ascii_case(selector))
                    .unwrap_or(false)
        })
        .cloned()
        .with_context(|| format!("No member named {}", selector))
}

/// Parse "12", "12.5" or "12.50" into minor units
fn parse_amount(text: &str) -> Result<i64> {
    let (whole, fraction) = text.split_once('.').unwrap_or((text, ""));
    let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if whole.is_empty() || fraction.len() > 2 || !all_digits(whole) || !all_digits(fraction) {
        bail!("Invalid amount: {}", text);
    }
    let whole: i64 = whole.parse().with_context(|| format!("Amount too large: {}", text))?;
    let cents: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>()? * 10,
        _ => fraction.parse()?,
    };
    whole
        .checked_mul(100)
        .and_then(|minor| minor.checked_add(cents))
        .with_context(|| format!("Amount too large: {}", text))
}

fn format_amount(minor: i64) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Equal shares; the first members absorb the remainder one unit each
fn split_evenly(amount: i64, members: &[UserId]) -> Vec<Share> {
    let count = members.len() as i64;
    let base = amount / count;
    let remainder = amount % count;
    members
        .iter()
        .enumerate()
        .map(|(index, user_id)| Share {
            user_id: user_id.clone(),
            amount: base + i64::from((index as i64) < remainder),
        })
        .collect()
}
