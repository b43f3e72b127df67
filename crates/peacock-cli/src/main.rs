// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod logging;
mod runtime;

use anyhow::{Context, Result};
use config::Config;
use logging::LogTarget;
use peacock_app::{AppState, MenuService, View};
use peacock_db::{DEMO_ADMIN_EMAIL, DEMO_ADMIN_PASSWORD, LocalMenuService, Store};
use peacock_remote::RestClient;
use runtime::StoreRuntime;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `peacock --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;

    // demo mode swaps the data service only; preferences still persist
    let db_path = config.db_path()?;
    if options.print_db_path {
        println!("{}", db_path.display());
        return Ok(());
    }

    let log_dir = config.log_dir()?;
    let target = if options.check_only {
        LogTarget::Stderr
    } else {
        LogTarget::Directory(&log_dir)
    };
    let _log_guard = logging::init(config.log_level(), target)?;
    tracing::info!(
        config = %options.config_path.display(),
        demo = options.demo,
        "starting peacock"
    );

    let store = open_store(&db_path)?;
    let service = build_service(&config, &options)?;
    if options.check_only {
        let rows = service
            .list_available_items()
            .context("fetch menu from data service")?;
        tracing::info!(rows = rows.len(), "startup check passed");
        return Ok(());
    }

    let mut state = AppState::with_language(config.default_language());
    if options.admin {
        state.view = View::Admin;
    }

    let mut runtime = StoreRuntime::new(&store, service);
    let result = peacock_tui::run_app(&mut state, &mut runtime);
    if let Err(error) = &result {
        tracing::error!(error = %format!("{error:#}"), "terminal ui exited with an error");
    }
    result
}

fn open_store(db_path: &Path) -> Result<Store> {
    let store = Store::open(db_path).with_context(|| {
        format!(
            "open database {} -- if this path is wrong, set [storage].db_path or PEACOCK_DB_PATH",
            db_path.display()
        )
    })?;
    store.bootstrap()?;
    Ok(store)
}

fn build_service(config: &Config, options: &CliOptions) -> Result<Arc<dyn MenuService>> {
    if options.demo {
        tracing::info!(admin = DEMO_ADMIN_EMAIL, "using in-memory demo menu");
        return Ok(Arc::new(LocalMenuService::open_seeded()?));
    }

    let (url, anon_key) = config.service_settings(&options.config_path)?;
    let client = RestClient::new(&url, &anon_key, config.service_timeout()?)
        .with_context(|| invalid_service_hint(&options.config_path))?;
    tracing::info!(base_url = client.base_url(), "using hosted data service");
    Ok(Arc::new(client))
}

fn invalid_service_hint(config_path: &Path) -> String {
    format!(
        "invalid [service] config in {}; fix url/anon_key/timeout values",
        config_path.display()
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_db_path: bool,
    demo: bool,
    admin: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_db_path: false,
        demo: false,
        admin: false,
        print_example: false,
        check_only: false,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-path" => {
                options.print_db_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--admin" => {
                options.admin = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow::anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("peacock: bilingual restaurant menu");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-path             Print resolved database path");
    println!("  --print-example-config   Print a config template");
    println!(
        "  --demo                   Use a seeded in-memory menu (admin: {DEMO_ADMIN_EMAIL} / {DEMO_ADMIN_PASSWORD})"
    );
    println!("  --admin                  Start on the admin screen");
    println!("  --check                  Validate config, database, and data service, then exit");
    println!("  --help                   Show this help");
}

#[cfg(test)]
mod tests {
    use super::{CliOptions, build_service, open_store, parse_cli_args};
    use crate::config::{Config, env_lock};
    use crate::runtime::StoreRuntime;
    use anyhow::Result;
    use peacock_app::Language;
    use peacock_tui::AppRuntime;
    use std::path::PathBuf;

    fn default_options_path() -> PathBuf {
        PathBuf::from("/tmp/peacock-config.toml")
    }

    #[test]
    fn parse_cli_args_defaults_to_provided_config_path() -> Result<()> {
        let options = parse_cli_args(Vec::<String>::new(), default_options_path())?;
        assert_eq!(
            options,
            CliOptions {
                config_path: default_options_path(),
                print_config_path: false,
                print_db_path: false,
                demo: false,
                admin: false,
                print_example: false,
                check_only: false,
                show_help: false,
            }
        );
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_config_path_override() -> Result<()> {
        let options = parse_cli_args(
            vec!["--config", "/custom/config.toml"],
            default_options_path(),
        )?;
        assert_eq!(options.config_path, PathBuf::from("/custom/config.toml"));
        Ok(())
    }

    #[test]
    fn parse_cli_args_errors_for_missing_config_value() {
        let error = parse_cli_args(vec!["--config"], default_options_path())
            .expect_err("missing config value should fail");
        assert!(error.to_string().contains("--config requires a file path"));
    }

    #[test]
    fn parse_cli_args_errors_for_unknown_argument() {
        let error = parse_cli_args(vec!["--wat"], default_options_path())
            .expect_err("unknown arg should fail");
        let message = error.to_string();
        assert!(message.contains("unknown argument"));
        assert!(message.contains("--help"));
    }

    #[test]
    fn parse_cli_args_sets_mode_flags() -> Result<()> {
        let options = parse_cli_args(
            vec!["--demo", "--admin", "--check", "--print-path"],
            default_options_path(),
        )?;
        assert!(options.demo);
        assert!(options.admin);
        assert!(options.check_only);
        assert!(options.print_db_path);
        assert!(!options.print_example);
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_help_flag_for_long_and_short_variants() -> Result<()> {
        assert!(parse_cli_args(vec!["--help"], default_options_path())?.show_help);
        assert!(parse_cli_args(vec!["-h"], default_options_path())?.show_help);
        Ok(())
    }

    #[test]
    fn demo_service_serves_seeded_menu() -> Result<()> {
        let options = parse_cli_args(vec!["--demo"], default_options_path())?;
        let service = build_service(&Config::default(), &options)?;
        assert!(!service.list_available_items()?.is_empty());
        Ok(())
    }

    #[test]
    fn demo_mode_keeps_language_in_configured_database() -> Result<()> {
        let _guard = env_lock();
        let temp = tempfile::tempdir()?;
        let db_path = temp.path().join("peacock.db");
        let config_path = temp.path().join("config.toml");
        std::fs::write(
            &config_path,
            format!(
                "version = 1\n[storage]\ndb_path = {:?}\n",
                db_path.to_string_lossy()
            ),
        )?;
        let config = Config::load(&config_path)?;
        let options = parse_cli_args(vec!["--demo"], config_path.clone())?;
        assert_eq!(config.db_path()?, db_path);

        {
            let store = open_store(&config.db_path()?)?;
            let mut runtime = StoreRuntime::new(&store, build_service(&config, &options)?);
            runtime.save_language(Language::Cn)?;
        }

        let reopened = open_store(&db_path)?;
        assert_eq!(reopened.get_language()?, Some(Language::Cn));
        Ok(())
    }

    #[test]
    fn remote_service_rejects_non_http_url() -> Result<()> {
        let _guard = env_lock();
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            "version = 1\n[service]\nurl = \"ftp://db.example\"\nanon_key = \"anon\"\n",
        )?;
        let config = Config::load(&path)?;
        let path_arg = path.to_string_lossy().into_owned();
        let options = parse_cli_args(vec!["--config", path_arg.as_str()], path.clone())?;

        let error = match build_service(&config, &options) {
            Ok(_) => panic!("ftp url should be rejected"),
            Err(error) => error,
        };
        assert!(format!("{error:#}").contains("invalid [service] config"));
        Ok(())
    }
}
