//! d4t: 基于词典的 HTML 文本替换工具

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::Level;

use d4t::core::{translate_document, TranslatorOptions};
use d4t::env::{self, EnvVar};
use d4t::translation::{
    ConfigManager, DictionaryLoader, EngineConfig, MatchPolicy, PatternCompiler, TranslatorError,
    TranslatorResult,
};

#[derive(Parser)]
#[command(name = "d4t")]
#[command(version)]
#[command(about = "Dictionary-driven text replacement for HTML documents")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a dictionary to a local file or remote page
    Translate {
        /// Path, file:// URL or http(s):// URL of the document
        #[arg(value_name = "TARGET")]
        target: String,

        /// Dictionary resource (relative to the resource directory, or a URL)
        #[arg(short, long)]
        dictionary: Option<String>,

        /// Resource directory for relative dictionary paths
        #[arg(short, long)]
        resource_dir: Option<PathBuf>,

        /// Write the result to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Match patterns anywhere, not only on word boundaries
        #[arg(long)]
        substring: bool,

        /// JSON file holding the activation flag
        #[arg(long, value_name = "FILE")]
        flag_file: Option<String>,

        /// Read configuration from this file instead of the search paths
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Force the document charset
        #[arg(short, long)]
        encoding: Option<String>,

        /// Only log errors
        #[arg(short, long)]
        silent: bool,

        /// Log every changed text
        #[arg(short, long)]
        verbose: bool,
    },

    /// Lint a dictionary and report entries that fail to compile
    Check {
        #[arg(value_name = "DICT")]
        dictionary: String,

        /// Read configuration from this file instead of the search paths
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Compile patterns without word boundaries
        #[arg(long)]
        substring: bool,
    },

    /// Rewrite a dictionary in matching order
    Sort {
        #[arg(value_name = "DICT")]
        dictionary: String,

        /// Write the sorted dictionary to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write an example configuration file, or list environment variables
    Config {
        #[arg(value_name = "OUT", required_unless_present = "env_vars")]
        output: Option<PathBuf>,

        /// Print the supported environment variables instead
        #[arg(long = "env")]
        env_vars: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let (silent, verbose) = match &cli.command {
        Commands::Translate {
            silent, verbose, ..
        } => (*silent, *verbose),
        _ => (false, false),
    };
    init_logging(silent, verbose);

    match run(cli.command) {
        Ok(code) => code,
        Err(e) => {
            e.log();
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(silent: bool, verbose: bool) {
    let level = if silent {
        Level::ERROR
    } else if verbose {
        Level::DEBUG
    } else {
        env::core::LogLevel::get()
            .ok()
            .and_then(|level| level.parse().ok())
            .unwrap_or(Level::INFO)
    };
    let no_color = env::core::NoColor::get().unwrap_or(false);

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(!no_color)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn run(command: Commands) -> TranslatorResult<ExitCode> {
    match command {
        Commands::Translate {
            target,
            dictionary,
            resource_dir,
            output,
            substring,
            flag_file,
            config,
            encoding,
            verbose,
            ..
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(dictionary) = dictionary {
                config.dictionary = dictionary;
            }
            if let Some(resource_dir) = resource_dir {
                config.resource_dir = resource_dir;
            }
            if substring {
                config.match_policy = MatchPolicy::Substring;
            }
            config.verbose_logging |= verbose;
            config.validate()?;

            let options = TranslatorOptions {
                config,
                encoding,
                flag_file,
                ..TranslatorOptions::default()
            };

            let document = translate_document(&options, &target)?;
            if !document.activated {
                tracing::warn!("翻译已关闭，输出原文档");
            }
            tracing::info!(
                "完成: {} 个文本节点, {} 处替换",
                document.stats.text_nodes,
                document.stats.replacements
            );

            write_output(output.as_deref(), &document.data)?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Check {
            dictionary,
            config,
            substring,
        } => {
            let mut config = load_config(config.as_deref())?;
            if substring {
                config.match_policy = MatchPolicy::Substring;
            }

            // 命令行给出的词典路径相对于当前目录
            let loaded = DictionaryLoader::default().load(&dictionary)?;

            for issue in loaded.lint() {
                println!("warning: {}", issue);
            }

            let matchers = PatternCompiler::from_config(&config).compile(&loaded);
            for (pattern, e) in matchers.failures() {
                println!("error: {:?}: {}", pattern, e);
            }

            println!(
                "{} entries, {} compiled, {} failed",
                loaded.len(),
                matchers.len(),
                matchers.failures().len()
            );

            if matchers.failures().is_empty() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }

        Commands::Sort { dictionary, output } => {
            let loaded = DictionaryLoader::default().load(&dictionary)?;

            for key in loaded.duplicates() {
                eprintln!("collapsed duplicate key: {:?}", key);
            }

            let mut json = loaded
                .sorted_for_matching()
                .to_pretty_json()
                .map_err(|e| TranslatorError::Document(format!("序列化词典失败: {}", e)))?;
            json.push('\n');

            write_output(output.as_deref(), json.as_bytes())?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Config { output, env_vars } => {
            if env_vars {
                print!("{}", env::generate_env_docs());
            }
            if let Some(path) = output {
                ConfigManager::generate_example_config(&path)?;
                eprintln!("wrote {}", path.display());
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// 指定文件或搜索路径中的配置，已应用环境变量覆盖
fn load_config(path: Option<&Path>) -> TranslatorResult<EngineConfig> {
    let manager = match path {
        Some(path) => ConfigManager::from_path(path)?,
        None => ConfigManager::new()?,
    };
    if let Some(source) = manager.source() {
        tracing::debug!("配置文件: {}", source.display());
    }
    Ok(manager.into_config())
}

fn write_output(path: Option<&Path>, data: &[u8]) -> io::Result<()> {
    match path {
        Some(path) => fs::write(path, data),
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(data)?;
            stdout.flush()
        }
    }
}
