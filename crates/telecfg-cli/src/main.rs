//! `telecfg`：运营商配置桥接的命令行入口。
//!
//! # 使用方法
//! ```bash
//! telecfg --image device.json device init --sdk 34 --patch 2025-10-01
//! telecfg --image device.json subs
//! telecfg --image device.json set 1 carrier_volte_available_bool bool:true
//! telecfg --image device.json toggle 1 vonr
//! ```
//! - 全局参数覆盖 `telecfg.toml` 中的同名配置；
//! - `broker` 子命令不面向操作者：它就是二级进程入口，由 [`CommandLauncher`] 以提升身份拉起，
//!   标准输出只写一行完成记录，日志统一写标准错误。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use telecfg_core::{
    BridgeConfig, BridgeContext, CommandLauncher, ConfigValue, FeatureFlag, OsRelease,
    SubscriptionContext,
};
use telecfg_emulator::{DeviceImage, EmulatedDevice};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

const DEFAULT_CONFIG_PATH: &str = "telecfg.toml";

#[derive(Parser)]
#[command(name = "telecfg", version, about = "Read and override carrier configuration")]
struct Cli {
    /// TOML 配置文件；不存在时使用默认值。
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// 设备镜像文件，覆盖 `[device].image`。
    #[arg(long, global = true)]
    image: Option<PathBuf>,
    /// 二级进程的可执行文件，覆盖 `[launcher].program`。
    #[arg(long, global = true)]
    program: Option<PathBuf>,
    /// 提升身份用的 argv 前缀，以逗号分隔，例如 `su,2000`。
    #[arg(long, global = true, value_delimiter = ',')]
    elevate: Option<Vec<String>>,
    /// 委托身份的目标 uid，覆盖 `[device].caller_uid`。
    #[arg(long, global = true)]
    uid: Option<u32>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(flatten)]
    Client(ClientCommand),
    /// 管理仿真设备镜像。
    #[command(subcommand)]
    Device(DeviceCommand),
    /// 二级进程入口。
    #[command(hide = true)]
    Broker {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

/// 面向操作者、经由配置桥执行的命令。
#[derive(Subcommand)]
enum ClientCommand {
    /// 列出活动订阅。
    Subs,
    /// 读取单个配置项，按 `<类型>:<值>` 输出。
    Get {
        #[arg(allow_negative_numbers = true)]
        subscription: i32,
        key: String,
    },
    /// 输出订阅的全部生效配置。
    Dump {
        #[arg(allow_negative_numbers = true)]
        subscription: i32,
    },
    /// 覆写单个配置项，值格式为 `<类型>:<值>`，例如 `int[]:[1,2]`。
    Set {
        #[arg(allow_negative_numbers = true)]
        subscription: i32,
        key: String,
        value: String,
    },
    /// 清除订阅上的全部覆写。
    Clear {
        #[arg(allow_negative_numbers = true)]
        subscription: i32,
    },
    /// 列出特性开关的当前状态。
    Flags {
        #[arg(allow_negative_numbers = true)]
        subscription: i32,
    },
    /// 翻转特性开关并重启 IMS 注册。
    Toggle {
        #[arg(allow_negative_numbers = true)]
        subscription: i32,
        flag: FeatureFlag,
    },
    /// 重启订阅所在卡槽的 IMS 注册。
    RestartIms {
        #[arg(allow_negative_numbers = true)]
        subscription: i32,
    },
    /// 设备本身是否支持 IMS。
    ImsSupport,
}

#[derive(Subcommand)]
enum DeviceCommand {
    /// 写出双卡示例镜像。
    Init {
        #[arg(long, default_value_t = telecfg_core::sdk::UPSIDE_DOWN_CAKE)]
        sdk: u32,
        #[arg(long, default_value = "2024-01-01")]
        patch: String,
        /// 覆盖已存在的镜像。
        #[arg(long)]
        force: bool,
    },
    /// 以 JSON 输出镜像内容。
    Show,
    /// 模拟服务进程重启，所有覆写丢失。
    Restart,
}

/// 配置文件与命令行参数合并后的运行设置。
struct Settings {
    config_path: PathBuf,
    image: Option<PathBuf>,
    program: Option<PathBuf>,
    elevate: Vec<String>,
    caller_uid: u32,
}

impl Settings {
    fn merge(cli: &Cli, config: BridgeConfig) -> Self {
        Self {
            config_path: cli.config.clone(),
            image: cli.image.clone().or(config.device.image),
            program: cli.program.clone().or(config.launcher.program),
            elevate: cli.elevate.clone().unwrap_or(config.launcher.elevate),
            caller_uid: cli.uid.unwrap_or(config.device.caller_uid),
        }
    }

    fn image(&self) -> Result<&Path> {
        match self.image.as_deref() {
            Some(path) => Ok(path),
            None => bail!("no device image configured; pass --image or set [device].image"),
        }
    }

    /// 以当前程序的 `broker` 子命令作为二级进程。
    fn launcher(&self) -> Result<CommandLauncher> {
        let program = match &self.program {
            Some(program) => program.clone(),
            None => std::env::current_exe().context("failed to locate the current executable")?,
        };
        let base_args = vec![
            "--config".to_owned(),
            self.config_path.display().to_string(),
            "--image".to_owned(),
            self.image()?.display().to_string(),
            "--uid".to_owned(),
            self.caller_uid.to_string(),
            "broker".to_owned(),
            "--".to_owned(),
        ];
        Ok(CommandLauncher::new(program)
            .with_elevation(self.elevate.iter().cloned())
            .with_base_args(base_args))
    }
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            eprintln!("telecfg: {error:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config = BridgeConfig::load(&cli.config)?;
    install_tracing(config.logging.filter.as_deref());
    let settings = Settings::merge(&cli, config);

    match cli.command {
        Command::Broker { args } => run_broker(&settings, args),
        Command::Device(command) => run_device(&settings, command),
        Command::Client(command) => {
            let ctx = client_context(&settings)?;
            run_client(&ctx, command)?;
            Ok(0)
        }
    }
}

/// `RUST_LOG` 优先，其次是配置文件中的过滤器，最后回落到 `info`。
fn install_tracing(fallback: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(fallback.unwrap_or("info")));
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr));
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("telecfg: tracing subscriber already installed");
    }
}

fn client_context(settings: &Settings) -> Result<BridgeContext> {
    let image = settings.image()?;
    let device = EmulatedDevice::open(image)
        .with_context(|| format!("failed to open device image `{}`", image.display()))?;
    let launcher = settings.launcher()?;
    debug!(program = %launcher.program().display(), "secondary process configured");
    Ok(device
        .context_builder()?
        .launcher(Arc::new(launcher))
        .caller_uid(settings.caller_uid)
        .build())
}

fn run_client(ctx: &BridgeContext, command: ClientCommand) -> Result<()> {
    let facade = |subscription: i32| ctx.subscription(SubscriptionContext::for_subscription(subscription));

    match command {
        ClientCommand::Subs => {
            for info in ctx.directory().subscriptions()? {
                println!("{}", serde_json::to_string(&info)?);
            }
        }
        ClientCommand::Get { subscription, key } => match facade(subscription).get_value(&key) {
            Some(value) => println!("{}", value.to_wire()),
            None => bail!("`{key}` is not set for subscription {subscription}"),
        },
        ClientCommand::Dump { subscription } => {
            let Some(bundle) = facade(subscription).try_snapshot()? else {
                bail!("subscription {subscription} is not valid");
            };
            for (key, value) in bundle.iter() {
                println!("{key}={}", value.to_wire());
            }
        }
        ClientCommand::Set {
            subscription,
            key,
            value,
        } => {
            let value = ConfigValue::from_wire(&value)
                .with_context(|| format!("invalid value for `{key}`"))?;
            let receipt = facade(subscription).set(&key, value)?;
            println!("{}", serde_json::to_string(&receipt)?);
        }
        ClientCommand::Clear { subscription } => {
            let receipt = facade(subscription).clear()?;
            println!("{}", serde_json::to_string(&receipt)?);
        }
        ClientCommand::Flags { subscription } => {
            for (flag, enabled) in facade(subscription).flags() {
                println!("{flag}\t{}", if enabled { "on" } else { "off" });
            }
        }
        ClientCommand::Toggle { subscription, flag } => {
            let enabled = facade(subscription).toggle_flag(flag)?;
            println!("{flag}\t{}", if enabled { "on" } else { "off" });
        }
        ClientCommand::RestartIms { subscription } => facade(subscription).restart_registration()?,
        ClientCommand::ImsSupport => println!("{}", ctx.directory().device_supports_ims()),
    }
    Ok(())
}

fn run_device(settings: &Settings, command: DeviceCommand) -> Result<i32> {
    let image = settings.image()?;
    match command {
        DeviceCommand::Init { sdk, patch, force } => {
            if image.exists() && !force {
                bail!("`{}` already exists; pass --force to replace it", image.display());
            }
            EmulatedDevice::create(image, &DeviceImage::sample(OsRelease::new(sdk, patch)))?;
            info!(image = %image.display(), sdk, "device image written");
        }
        DeviceCommand::Show => {
            let device = EmulatedDevice::open(image)?;
            println!("{}", serde_json::to_string_pretty(&device.image()?)?);
        }
        DeviceCommand::Restart => {
            EmulatedDevice::open(image)?.restart_service()?;
            info!(image = %image.display(), "service process restarted");
        }
    }
    Ok(0)
}

/// 二级进程：以提升身份打开设备，执行请求，并把完成记录写到标准输出。
fn run_broker(settings: &Settings, args: Vec<String>) -> Result<i32> {
    let device = EmulatedDevice::open_elevated(settings.image()?)?;
    let ctx = device.context_builder()?.caller_uid(settings.caller_uid).build();
    match ctx.broker().run(args) {
        Some(completion) => {
            println!("{}", completion.to_json_line());
            Ok(completion.exit_code())
        }
        None => Ok(0),
    }
}
