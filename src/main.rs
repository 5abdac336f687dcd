use clap::Parser;
use fabriqlib::core::config::SiteConfig;
use fabriqlib::core::engine::{Engine, EnginePaths, Timings};
use fabriqlib::render::highlight::SyntectHighlighter;
use std::path::{Path, PathBuf};

use eyre::WrapErr;
use tracing_subscriber::FmtSubscriber;

#[derive(clap::Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Site configuration file. The project root is its parent directory.
    #[clap(long, default_value = "site.yaml", env = "FABRIQ_CONFIG")]
    config: PathBuf,

    #[clap(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Build site
    Build,
    /// Lint content without building
    Lint,
    /// List syntax highlighting themes, or generate CSS for one
    Themes {
        /// Theme to generate CSS for
        name: Option<String>,
    },
}

fn main() -> Result<(), eyre::Report> {
    color_eyre::install()?;

    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fabriq=info,fabriqlib=info,fabriq_user=info".into()),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::Build => {
            let mut engine = new_engine(&args.config)?;
            let timings: Timings = engine.build_site()?;
            println!("site built in {}ms", timings.total().as_millis());
        }
        Command::Lint => {
            let mut engine = new_engine(&args.config)?;
            let mut timings = Timings::new();
            engine.load_content(&mut timings)?;

            let lints = engine.run_lints();
            if !lints.is_empty() {
                println!("{lints}");
            }
            if lints.has_deny() {
                return Err(eyre::eyre!("lint errors found"));
            }
        }
        Command::Themes { name } => {
            let highlighter = SyntectHighlighter::new()?;
            match name {
                Some(name) => {
                    let theme = highlighter.generate_css_theme(&name)?;
                    println!("{}", theme.css());
                }
                None => {
                    for name in highlighter.theme_names() {
                        println!("{name}");
                    }
                }
            }
        }
    }

    Ok(())
}

fn new_engine(config_path: &Path) -> Result<Engine, eyre::Report> {
    let config_path = config_path
        .canonicalize()
        .wrap_err_with(|| format!("no site config found at '{}'", config_path.display()))?;
    let project_root = config_path
        .parent()
        .ok_or_else(|| eyre::eyre!("failed to discover project root"))?;

    let config = SiteConfig::from_file(&config_path)?;
    let paths = EnginePaths::from_config(project_root, &config);
    Engine::new(paths, config)
}
