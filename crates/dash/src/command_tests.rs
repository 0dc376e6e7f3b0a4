// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn parse(args: &[&str]) -> anyhow::Result<Cli> {
    Ok(Cli::try_parse_from(std::iter::once("fleetdash").chain(args.iter().copied()))?)
}

#[test]
fn login_with_password() -> anyhow::Result<()> {
    let cli = parse(&["login", "--username", "alice", "--password", "correct-pw"])?;
    match cli.command {
        Command::Login { username, password, sso } => {
            assert_eq!(username.as_deref(), Some("alice"));
            assert_eq!(password.as_deref(), Some("correct-pw"));
            assert!(!sso);
        }
        other => anyhow::bail!("unexpected command: {other:?}"),
    }
    Ok(())
}

#[test]
fn sso_conflicts_with_username() {
    assert!(parse(&["login", "--sso", "--username", "alice", "--password", "pw"]).is_err());
}

#[test]
fn search_defaults_to_all_types() -> anyhow::Result<()> {
    let cli = parse(&["apps", "search"])?;
    match cli.command {
        Command::Apps { command: AppsCommand::Search { term, kind } } => {
            assert_eq!(term, "");
            assert_eq!(kind, ALL_TYPES);
        }
        other => anyhow::bail!("unexpected command: {other:?}"),
    }
    Ok(())
}

#[test]
fn global_config_flags_flatten() -> anyhow::Result<()> {
    let cli = parse(&[
        "--api-url",
        "http://api.local/api/v1",
        "--refresh-margin-secs",
        "30",
        "--log-json",
        "whoami",
    ])?;
    assert_eq!(cli.config.api_url, "http://api.local/api/v1");
    assert_eq!(cli.config.refresh_margin(), Duration::from_secs(30));
    assert!(cli.log_json);
    assert!(matches!(cli.command, Command::Whoami));
    Ok(())
}

#[test]
fn deploy_args_map_to_request() -> anyhow::Result<()> {
    let cli = parse(&[
        "apps", "deploy", "--name", "grafana", "--version", "10.2", "--type", "Monitoring", "--pods",
        "2",
    ])?;
    let Command::Apps { command: AppsCommand::Deploy(args) } = cli.command else {
        anyhow::bail!("expected deploy");
    };
    let request = DeployRequest::from(args);
    assert_eq!(request.name, "grafana");
    assert_eq!(request.kind, "Monitoring");
    assert_eq!(request.pod_count, Some(2));
    assert_eq!(request.image_url, None);
    Ok(())
}

#[test]
fn session_file_lives_in_state_dir() {
    let mut config = DashConfig::for_api("http://api.local");
    config.state_dir = Some(PathBuf::from("/tmp/fd"));
    assert_eq!(session_file(&config), PathBuf::from("/tmp/fd/session.json"));
}
