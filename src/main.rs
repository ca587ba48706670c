//! QMetry lane CLI
//!
//! Entry point for the `qmetry` command-line tool.

use clap::{Parser, Subcommand};
use qmetry_lane::cache::FileCacheStore;
use qmetry_lane::config::{write_template, ConfigLoader, EffectiveConfig};
use qmetry_lane::export::{
    default_output_path, export_to_path, find_feature_files, COMBINED_EXPORT_NAME,
};
use qmetry_lane::qmetry::render_folder_tree;
use qmetry_lane::record::{build_records, BuildOutput, ResolvedRecord, ValidationWarning};
use qmetry_lane::{parse_feature_file, QmetryClient, TestCaseRepository, UploadOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "qmetry")]
#[command(about = "Convert Gherkin feature files to QMetry test cases", version)]
struct Cli {
    /// Config file (default: nearest .qmetry_config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check feature files for errors and warnings
    Validate {
        /// Feature file (default: every *.feature under the working directory)
        file: Option<PathBuf>,
    },

    /// Write QMetry import CSV
    #[command(alias = "exp")]
    Export {
        /// Feature file, or `all` for every *.feature under the working directory
        #[arg(default_value = "all")]
        target: String,

        /// Output CSV path
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Create or update test cases in QMetry
    #[command(alias = "up")]
    Upload {
        /// Feature file
        file: PathBuf,

        /// Optional `to PATH` target folder
        #[arg(num_args = 0..=2)]
        destination: Vec<String>,

        /// Target folder, overriding @Folder and the configured default
        #[arg(long)]
        folder: Option<String>,

        /// Show what would happen without changing anything
        #[arg(long)]
        dry: bool,

        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,

        /// Also write the uploaded records, with issue keys, to this CSV
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Write a JSON upload report
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Show the project's test case folder tree
    Folders,

    /// Write a config template, or show the effective config
    Config {
        /// Print the effective configuration (API key redacted)
        #[arg(long)]
        show: bool,

        /// Template path (default: .qmetry_config.yaml.template)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Validate { file } => run_validate(file),
        Commands::Export { target, output } => run_export(&target, output),
        Commands::Upload {
            file,
            destination,
            folder,
            dry,
            yes,
            csv,
            report,
        } => {
            let folder = match resolve_destination(folder, &destination) {
                Ok(f) => f,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    process::exit(2);
                }
            };
            run_upload(cli.config, &file, folder, dry, yes, csv, report);
        }
        Commands::Folders => run_folders(cli.config),
        Commands::Config { show, output } => run_config(cli.config, show, output),
    }
}

/// `-v` forces debug; otherwise `RUST_LOG`, falling back to warn
fn log_directives(verbose: bool, rust_log: Option<String>) -> String {
    if verbose {
        return "debug".to_string();
    }
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .unwrap_or_else(|| "warn".to_string())
}

fn init_logging(verbose: bool) {
    let directives = log_directives(verbose, std::env::var(EnvFilter::DEFAULT_ENV).ok());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// `--folder PATH` or a trailing `to PATH`
fn resolve_destination(folder: Option<String>, destination: &[String]) -> Result<Option<String>, String> {
    let positional = match destination {
        [] => None,
        [keyword, path] if keyword == "to" => Some(path.clone()),
        _ => {
            return Err(format!(
                "unexpected arguments '{}'; use `to FOLDER` or --folder FOLDER",
                destination.join(" ")
            ))
        }
    };

    match (folder, positional) {
        (Some(a), Some(b)) if a != b => Err(format!(
            "conflicting target folders '{}' and '{}'",
            a, b
        )),
        (a, b) => Ok(a.or(b)),
    }
}

fn print_warnings(file: &Path, warnings: &[ValidationWarning]) {
    for warning in warnings {
        eprintln!("  warning: {}: {}", file.display(), warning);
    }
}

/// Parse and build one file, reporting errors; None if it did not parse
fn load_records(file: &Path) -> Option<BuildOutput> {
    match parse_feature_file(file) {
        Ok(doc) => {
            let output = build_records(&doc);
            print_warnings(file, &output.warnings);
            Some(output)
        }
        Err(e) => {
            eprintln!("✗ {}", e);
            None
        }
    }
}

fn feature_files_in_cwd() -> Vec<PathBuf> {
    match find_feature_files(Path::new(".")) {
        Ok(files) => files,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn run_validate(file: Option<PathBuf>) {
    let files = match file {
        Some(f) => vec![f],
        None => feature_files_in_cwd(),
    };
    if files.is_empty() {
        eprintln!("No .feature files found");
        process::exit(1);
    }

    let mut failed = 0;
    for file in &files {
        match load_records(file) {
            Some(output) => {
                println!(
                    "✓ {}: {} scenario(s), {} warning(s)",
                    file.display(),
                    output.records.len(),
                    output.warnings.len()
                );
            }
            None => failed += 1,
        }
    }

    println!();
    println!("{} file(s) checked, {} with errors", files.len(), failed);
    process::exit(if failed > 0 { 1 } else { 0 });
}

fn run_export(target: &str, output: Option<PathBuf>) {
    let (files, out_path) = if target == "all" {
        let files = feature_files_in_cwd();
        if files.is_empty() {
            eprintln!("No .feature files found");
            process::exit(1);
        }
        (files, output.unwrap_or_else(|| PathBuf::from(COMBINED_EXPORT_NAME)))
    } else {
        let file = PathBuf::from(target);
        let out = output.unwrap_or_else(|| default_output_path(&file));
        (vec![file], out)
    };

    let mut records: Vec<ResolvedRecord> = Vec::new();
    let mut failed = 0;
    for file in &files {
        match load_records(file) {
            Some(output) => records.extend(output.records),
            None => failed += 1,
        }
    }

    // A single file that fails to parse produces no output at all
    if files.len() == 1 && failed == 1 {
        process::exit(1);
    }

    if let Err(e) = export_to_path(&out_path, &records) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    println!(
        "✓ Exported {} test case(s) from {} file(s) to {}",
        records.len(),
        files.len() - failed,
        out_path.display()
    );
    if failed > 0 {
        eprintln!("{} file(s) skipped because of errors", failed);
        process::exit(1);
    }
}

fn load_config(explicit: Option<PathBuf>) -> EffectiveConfig {
    let mut loader = ConfigLoader::from_environment();
    if let Some(path) = explicit {
        loader = loader.with_explicit(path);
    }
    match loader.load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Config error: {}", e);
            process::exit(1);
        }
    }
}

/// Config plus a client, or exit
fn connect(explicit: Option<PathBuf>) -> (EffectiveConfig, QmetryClient) {
    let config = load_config(explicit);
    let settings = &config.settings;

    let project = match settings.require_api().and_then(|_| settings.project_id()) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Config error: {}", e);
            process::exit(1);
        }
    };

    match QmetryClient::new(&settings.base_url, &settings.api_key, project, settings.ssl_verify) {
        Ok(client) => (config, client),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn confirm(prompt: &str) -> bool {
    print!("{} (y/N) ", prompt);
    let _ = io::stdout().flush();

    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn run_upload(
    config_path: Option<PathBuf>,
    file: &Path,
    folder: Option<String>,
    dry: bool,
    yes: bool,
    csv: Option<PathBuf>,
    report_path: Option<PathBuf>,
) {
    let Some(output) = load_records(file) else {
        process::exit(1);
    };
    let mut records = output.records;

    let (config, client) = connect(config_path);

    println!(
        "{} test case(s) from {} -> project {}{}",
        records.len(),
        file.display(),
        config.settings.project,
        if dry { " (dry run)" } else { "" }
    );
    if let Some(ref f) = folder {
        println!("Target folder: {}", f);
    }

    if !dry && !yes && !confirm("Proceed?") {
        println!("Cancelled");
        process::exit(0);
    }

    let store = match config.config_dir {
        Some(ref dir) => FileCacheStore::in_dir(dir),
        None => FileCacheStore::in_dir(Path::new(".")),
    };
    let options = UploadOptions {
        folder_override: folder,
        default_folder: config.settings.default_folder.clone(),
        dry_run: dry,
        custom_fields: config.settings.custom_fields.clone(),
    };

    let report = qmetry_lane::upload_records(&client, &store, options, &mut records);

    for result in &report.results {
        let mark = if result.outcome.is_failure() { "✗" } else { "✓" };
        println!("{} {} [{}]: {}", mark, result.summary, result.folder, result.outcome);
    }
    println!();
    println!("{}", report.human_summary);

    if let Some(path) = csv {
        match export_to_path(&path, &records) {
            Ok(()) => println!("Wrote {}", path.display()),
            Err(e) => eprintln!("Error: {}", e),
        }
    }
    if let Some(path) = report_path {
        if let Err(e) = report.write_to_file(&path) {
            eprintln!("Error writing report {}: {}", path.display(), e);
        }
    }

    process::exit(report.exit_code());
}

fn run_folders(config_path: Option<PathBuf>) {
    let (_, client) = connect(config_path);

    match client.list_folders() {
        Ok(folders) if folders.is_empty() => println!("No folders"),
        Ok(folders) => print!("{}", render_folder_tree(&folders)),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn run_config(config_path: Option<PathBuf>, show: bool, output: Option<PathBuf>) {
    if show {
        let config = load_config(config_path);
        match config.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        }
        if !config.has_file_source() {
            eprintln!("No .qmetry_config.yaml found; showing defaults and environment only");
        }
        return;
    }

    match write_template(output.as_deref()) {
        Ok(path) => {
            println!("✓ Created config template: {}", path.display());
            println!("  Copy it to .qmetry_config.yaml and fill in QMETRY_API_KEY and QMETRY_PROJECT");
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_destination() {
        assert_eq!(resolve_destination(None, &[]).unwrap(), None);
        assert_eq!(
            resolve_destination(None, &["to".to_string(), "/Mobile".to_string()]).unwrap(),
            Some("/Mobile".to_string())
        );
        assert_eq!(
            resolve_destination(Some("/A".to_string()), &[]).unwrap(),
            Some("/A".to_string())
        );
        assert!(resolve_destination(None, &["into".to_string(), "/Mobile".to_string()]).is_err());
        assert!(resolve_destination(
            Some("/A".to_string()),
            &["to".to_string(), "/B".to_string()]
        )
        .is_err());
    }

    #[test]
    fn test_verbose_overrides_rust_log() {
        assert_eq!(log_directives(true, Some("qmetry_lane=info".to_string())), "debug");
        assert_eq!(log_directives(true, None), "debug");
        assert_eq!(
            log_directives(false, Some("qmetry_lane=info".to_string())),
            "qmetry_lane=info"
        );
        assert_eq!(log_directives(false, Some(" ".to_string())), "warn");
        assert_eq!(log_directives(false, None), "warn");
    }

    #[test]
    fn test_cli_parses_upload_forms() {
        let cli = Cli::try_parse_from(["qmetry", "up", "login.feature", "to", "/Mobile", "--dry"])
            .unwrap();
        match cli.command {
            Commands::Upload { file, destination, dry, .. } => {
                assert_eq!(file, PathBuf::from("login.feature"));
                assert_eq!(destination, vec!["to", "/Mobile"]);
                assert!(dry);
            }
            _ => panic!("expected upload"),
        }

        let cli = Cli::try_parse_from(["qmetry", "exp"]).unwrap();
        assert!(matches!(cli.command, Commands::Export { ref target, .. } if target == "all"));
    }
}
