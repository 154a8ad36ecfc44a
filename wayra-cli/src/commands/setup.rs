//! Setup command - full provisioning run

use anyhow::{bail, Result};
use clap::{Args, ValueEnum};
use colored::Colorize;
use dialoguer::{Input, Password, Select};

use super::{build_pipeline, get_run_log, log_event, report_outcome, user_directory, SettingsArgs};
use crate::output;
use wayra_core::{RunEvent, SetupRequest, UserAction};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ActionArg {
    /// Register a new user
    Create,
    /// Sign in as an existing user
    Login,
}

impl From<ActionArg> for UserAction {
    fn from(action: ActionArg) -> Self {
        match action {
            ActionArg::Create => UserAction::Create,
            ActionArg::Login => UserAction::Login,
        }
    }
}

#[derive(Args, Debug)]
pub struct SetupArgs {
    /// Create a new user or log in (prompted when omitted)
    #[arg(long, value_enum)]
    pub action: Option<ActionArg>,
    /// Username (prompted when omitted)
    #[arg(long, short = 'u', env = "WAYRA_USERNAME")]
    pub username: Option<String>,
    /// Password (prompted when omitted)
    #[arg(long, short = 'p', env = "WAYRA_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
    /// Output as JSON; every credential must then come from flags or env
    #[arg(long)]
    pub json: bool,
}

fn prompt_action() -> Result<UserAction> {
    let choices = ["Create a new user", "Enter existing user credentials"];
    let selection = Select::new()
        .with_prompt("Choose an action")
        .items(&choices)
        .default(0)
        .interact()?;
    Ok(if selection == 0 {
        UserAction::Create
    } else {
        UserAction::Login
    })
}

/// Fill in whatever the flags left out, prompting unless output is JSON
fn build_request(args: SetupArgs) -> Result<SetupRequest> {
    if args.json && (args.action.is_none() || args.username.is_none() || args.password.is_none()) {
        bail!("--json needs --action, --username and --password (or WAYRA_USERNAME / WAYRA_PASSWORD)");
    }

    let action = match args.action {
        Some(action) => action.into(),
        None => prompt_action()?,
    };
    let username = match args.username {
        Some(username) => username,
        None => Input::<String>::new().with_prompt("Username").interact_text()?,
    };
    let password = match args.password {
        Some(password) => password,
        None => Password::new().with_prompt("Password").interact()?,
    };

    Ok(SetupRequest {
        action,
        username: username.trim().to_string(),
        password: password.trim().to_string(),
    })
}

pub fn run(settings_args: &SettingsArgs, args: SetupArgs) -> Result<()> {
    let json = args.json;
    let settings = settings_args.load()?;
    let run_log = get_run_log();
    log_event(&run_log, RunEvent::new("command_executed").with_detail("setup"));

    let request = build_request(args)?;

    if !json {
        println!("{}", "=== Wayra setup ===".bold());
        output::info(&format!("Config file: {}", settings.config_path.display()));
        output::info(&format!("Migrations:  {}", settings.migrations_dir.display()));
    }

    let directory = user_directory(&settings)?;
    let pipeline = build_pipeline(settings, &run_log).with_user_directory(directory);
    report_outcome(pipeline.run(&request), json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_build_request_without_prompting() {
        let request = build_request(SetupArgs {
            action: Some(ActionArg::Login),
            username: Some(" denys ".to_string()),
            password: Some("secret\n".to_string()),
            json: true,
        })
        .unwrap();

        assert_eq!(request.action, UserAction::Login);
        assert_eq!(request.username, "denys");
        assert_eq!(request.password, "secret");
    }

    #[test]
    fn test_json_requires_all_credentials() {
        let err = build_request(SetupArgs {
            action: Some(ActionArg::Create),
            username: Some("denys".to_string()),
            password: None,
            json: true,
        })
        .unwrap_err();
        assert!(err.to_string().contains("--json"));
    }
}
