use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use site_binder::domain::model::{ErrorKind, SiteId};
use site_binder::domain::ports::{CertificateStore, SiteRepository};
use site_binder::utils::{logger, validation::Validate};
use site_binder::{
    BindingParser, CliConfig, Command, JsonFileSiteStore, Operation, Outcome, SiteEngine,
    ToolConfig,
};

const DEFAULT_STORE: &str = "host.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    let mut config = match &cli.config {
        Some(path) => ToolConfig::from_file(path)
            .with_context(|| format!("Failed to load config file '{}'", path))?,
        None => ToolConfig::with_store_path(DEFAULT_STORE),
    };
    if let Some(store) = &cli.store {
        config.host.store_path = store.clone();
    }

    // 初始化日誌
    if config.json_logging() {
        logger::init_json_logger(cli.verbose, config.log_level());
    } else {
        logger::init_cli_logger(cli.verbose, config.log_level());
    }
    tracing::debug!("CLI config: {:?}", cli);

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let store = JsonFileSiteStore::new(config.store_path());
    store
        .ensure_initialized(&config.application_pools(), &config.certificates())
        .await
        .context("Failed to initialize host store")?;
    tracing::info!("📁 Using host store {}", store.path().display());

    let engine = SiteEngine::new(store.clone(), store.clone()).with_default_ip(config.default_ip()?);

    match cli.command {
        Command::List => {
            let sites = store.list_sites().await?;
            print_json(&sites)?;
        }
        Command::Show { name, id } => {
            let site = match (name, id) {
                (Some(name), _) => store.get_site_by_name(&name).await?,
                (None, Some(id)) => store.get_site_by_id(SiteId(id)).await?,
                (None, None) => None,
            };
            match site {
                Some(site) => print_json(&site)?,
                None => {
                    eprintln!("❌ Site not found");
                    std::process::exit(2);
                }
            }
        }
        Command::Create(args) => {
            let outcome = engine.execute(Operation::Create(args.to_request())).await;
            report(outcome)?;
        }
        Command::Update { id, site } => {
            let outcome = engine
                .execute(Operation::Update {
                    id: SiteId(id),
                    request: site.to_request(),
                })
                .await;
            report(outcome)?;
        }
        Command::Delete { id } => {
            let outcome = engine.execute(Operation::Delete { id: SiteId(id) }).await;
            report(outcome)?;
        }
        Command::Parse { bindings } => {
            let certificates = store.list_certificates().await?;
            let parser = BindingParser::new(&certificates).with_default_ip(config.default_ip()?);
            match parser.parse_all(&bindings.to_inputs()) {
                Ok(parsed) => print_json(&parsed)?,
                Err(errors) => report(Outcome::Rejected(errors))?,
            }
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report(outcome: Outcome) -> anyhow::Result<()> {
    print_json(&outcome)?;

    if let Outcome::Rejected(errors) = &outcome {
        for error in errors {
            eprintln!("❌ {}", error);
        }

        // 主機無法連線屬系統錯誤，其餘為請求被拒
        let exit_code = if errors.iter().any(|e| e.kind == ErrorKind::HostUnavailable) {
            1
        } else {
            2
        };
        std::process::exit(exit_code);
    }

    tracing::info!("✅ Operation committed");
    Ok(())
}
