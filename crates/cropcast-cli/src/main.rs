// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod logging;
mod runtime;

use anyhow::{Context, Result, anyhow};
use config::Config;
use cropcast_app::Session;
use cropcast_testkit::{MockOptions, MockService};
use cropcast_tui::UiOptions;
use logging::LogTarget;
use runtime::ServiceRuntime;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

const DEMO_LATENCY: Duration = Duration::from_millis(250);

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
            "load config {}; run `cropcast --print-example-config` to generate a v1 template",
            options.config_path.display()
        )
    })?;

    let interactive = !options.check_only && !options.print_metadata;
    if interactive {
        let log_file = config.log_file()?;
        logging::init(LogTarget::File(&log_file), config.log_level())?;
    } else {
        logging::init(LogTarget::Stderr, config.log_level())?;
    }
    info!(config = %options.config_path.display(), "starting cropcast");

    let demo_service = if options.demo {
        let service = MockService::start_with(MockOptions {
            latency: DEMO_LATENCY,
            ..MockOptions::default()
        })?;
        info!(base_url = service.base_url(), "serving sample catalog");
        Some(service)
    } else {
        None
    };

    let cli_base_url = demo_service
        .as_ref()
        .map(MockService::base_url)
        .or(options.base_url.as_deref());
    let base_url = config.resolve_base_url(cli_base_url).inspect_err(|error| {
        error!(%error, "service base URL unavailable");
    })?;
    let timeout = config.timeout()?;
    let client = cropcast_api::Client::new(&base_url, timeout).with_context(|| {
        format!(
            "invalid [service] config in {}; fix base_url/timeout values",
            options.config_path.display()
        )
    })?;
    info!(base_url = client.base_url(), ?timeout, "service client ready");

    if options.check_only {
        let health = client
            .health()
            .map_err(|error| anyhow!("{error} -- check that the service is running and retry"))?;
        println!("{}: {}", client.base_url(), health.status);
        return Ok(());
    }

    if options.print_metadata {
        let metadata = client
            .metadata()
            .map_err(|error| anyhow!("{error} -- check that the service is running and retry"))?;
        let rendered =
            serde_json::to_string_pretty(&metadata).context("render model metadata")?;
        println!("{rendered}");
        return Ok(());
    }

    let ui_options = UiOptions {
        currency_symbol: config.currency_symbol().to_owned(),
    };
    let mut session = Session::new();
    let mut runtime = ServiceRuntime::new(client);
    let result = cropcast_tui::run_app(&mut session, &mut runtime, &ui_options);
    drop(demo_service);
    info!("cropcast exited");
    result
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    base_url: Option<String>,
    print_config_path: bool,
    print_example: bool,
    print_metadata: bool,
    demo: bool,
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
        base_url: None,
        print_config_path: false,
        print_example: false,
        print_metadata: false,
        demo: false,
        check_only: false,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--base-url" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--base-url requires a URL"))?;
                options.base_url = Some(value.as_ref().to_owned());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--print-metadata" => {
                options.print_metadata = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    if options.demo && options.base_url.is_some() {
        return Err(anyhow!(
            "--demo serves its own sample catalog; drop --base-url and retry"
        ));
    }

    Ok(options)
}

fn print_help() {
    println!("cropcast - crop price estimates in the terminal");
    println!("  --config <path>          Use a specific config path");
    println!("  --base-url <url>         Estimation service URL (overrides CROPCAST_API_BASE_URL)");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a v1 config template");
    println!("  --print-metadata         Print the service's model metadata and exit");
    println!("  --demo                   Launch against a built-in sample catalog");
    println!("  --check                  Validate config and reach the service, then exit");
    println!("  --help                   Show this help");
}
