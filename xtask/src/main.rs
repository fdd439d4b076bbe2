use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{exit, Command, ExitStatus};

use clap::{Parser, Subcommand, ValueEnum};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the word-cloud pipeline workspace",
    long_about = "A unified CLI for packaging the Lambda runtime, reconciling\n\
                  the deployment, and running CI checks for the word-cloud\n\
                  pipeline workspace."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and package the Lambda runtime zip artifact
    Package {
        /// Compilation target triple for the Lambda binary
        #[arg(long, default_value = "x86_64-unknown-linux-gnu")]
        target: String,
        /// Build profile used for the binary
        #[arg(value_enum, long, default_value_t = BuildProfile::Release)]
        profile: BuildProfile,
    },
    /// Reconcile the deployed pipeline against the desired state
    Provision {
        /// Print the pending delta without applying it
        #[arg(long)]
        plan: bool,
        /// Path to a packaged runtime zip
        #[arg(long, default_value = "dist/wordcloud_runtime.zip")]
        artifact: String,
    },
    /// Render a sample word cloud to disk
    Demo,
    /// Run Criterion benchmarks
    Bench,
    /// Run CI checks (fmt, clippy, tests, demo, benchmarks)
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::Check)]
        job: CiJob,
    },
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting, clippy, and tests
    Check,
    /// Build and run the rendering demo
    Examples,
    /// Run benchmarks
    Bench,
    /// Run check + examples + bench
    All,
}

#[derive(Clone, Copy, ValueEnum)]
enum BuildProfile {
    Debug,
    Release,
}

impl BuildProfile {
    fn dir_name(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
        }
    }

    fn as_cargo_flag(self) -> Option<&'static str> {
        match self {
            Self::Debug => None,
            Self::Release => Some("--release"),
        }
    }
}

// ── helpers ────────────────────────────────────────────────────────

fn step(label: &str) {
    eprintln!("\n=== {label} ===");
}

fn cargo(args: &[&str]) -> ExitStatus {
    eprintln!("+ cargo {}", args.join(" "));
    Command::new("cargo")
        .args(args)
        .status()
        .expect("failed to execute cargo")
}

fn run_cargo(args: &[&str]) {
    let status = cargo(args);
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn package_runtime(target: &str, profile: BuildProfile) {
    ensure_rust_target_installed(target);

    step("Build Lambda runtime binary");
    let mut cargo_args = vec![
        "build",
        "-p",
        "wordcloud_lambda",
        "--target",
        target,
        "--bin",
        "wordcloud_runtime",
    ];
    if let Some(flag) = profile.as_cargo_flag() {
        cargo_args.push(flag);
    }
    run_cargo(&cargo_args);

    step("Package Lambda zip artifact");
    let target_dir = Path::new("target").join(target).join(profile.dir_name());
    let dist_dir = Path::new("dist");
    fs::create_dir_all(dist_dir).expect("failed to create dist directory");

    let zip_path = dist_dir.join("wordcloud_runtime.zip");
    package_lambda_zip(
        &target_dir.join(binary_name("wordcloud_runtime", target)),
        &zip_path,
    );

    eprintln!("\nPackaged artifact:\n- {}", zip_path.display());
}

fn ensure_rust_target_installed(target: &str) {
    let output = Command::new("rustup")
        .args(["target", "list", "--installed"])
        .output();

    let output = match output {
        Ok(value) => value,
        Err(error) => {
            eprintln!(
                "warning: failed to run `rustup target list --installed` ({error}); continuing without target preflight"
            );
            return;
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        panic!(
            "failed to list installed rust targets; run `rustup target list --installed` manually. details: {}",
            stderr.trim()
        );
    }

    let installed = String::from_utf8_lossy(&output.stdout);
    if !installed.lines().any(|line| line.trim() == target) {
        panic!(
            "required rust target `{target}` is not installed. install it with `rustup target add {target}` and re-run `cargo run -p xtask -- package`"
        );
    }
}

fn binary_name(bin_name: &str, target: &str) -> String {
    if target.contains("windows") {
        format!("{bin_name}.exe")
    } else {
        bin_name.to_string()
    }
}

/// Custom-runtime contract: the executable ships as `bootstrap` at the zip
/// root, marked executable.
fn package_lambda_zip(binary_path: &Path, zip_path: &Path) {
    if !binary_path.exists() {
        panic!("expected lambda binary at '{}'", binary_path.display());
    }

    let binary = fs::read(binary_path).expect("failed to read lambda binary");
    let file = fs::File::create(zip_path).expect("failed to create lambda zip");
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o755);
    zip.start_file("bootstrap", options)
        .expect("failed to start bootstrap entry in lambda zip");
    zip.write_all(&binary)
        .expect("failed to write bootstrap entry");
    zip.finish().expect("failed to finish lambda zip");
}

// ── CI jobs ────────────────────────────────────────────────────────

fn ci_check() {
    step("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"]);

    step("Clippy");
    run_cargo(&[
        "clippy",
        "--all-targets",
        "--all-features",
        "--",
        "-D",
        "warnings",
    ]);

    step("Test wordcloud_core");
    run_cargo(&["test", "-p", "wordcloud_core"]);

    step("Test wordcloud_render");
    run_cargo(&["test", "-p", "wordcloud_render"]);

    step("Test wordcloud_provision");
    run_cargo(&["test", "-p", "wordcloud_provision"]);

    step("Test wordcloud_lambda");
    run_cargo(&["test", "-p", "wordcloud_lambda"]);
}

fn ci_examples() {
    step("Run render_demo");
    run_cargo(&[
        "run",
        "-p",
        "wordcloud_render",
        "--example",
        "render_demo",
        "--release",
    ]);
}

fn ci_bench() {
    step("Run benchmarks");
    run_cargo(&[
        "bench",
        "--package",
        "wordcloud_render",
        "--bench",
        "render",
    ]);
}

// ── main ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Package { target, profile } => {
            package_runtime(&target, profile);
        }
        Commands::Provision { plan, artifact } => {
            let mut args = vec![
                "run",
                "-p",
                "wordcloud_lambda",
                "--bin",
                "provision",
                "--release",
                "--",
            ];
            if plan {
                args.push("--plan");
            }
            args.push(&artifact);
            run_cargo(&args);
        }
        Commands::Demo => {
            run_cargo(&[
                "run",
                "-p",
                "wordcloud_render",
                "--example",
                "render_demo",
                "--release",
            ]);
        }
        Commands::Bench => {
            run_cargo(&[
                "bench",
                "--package",
                "wordcloud_render",
                "--bench",
                "render",
            ]);
        }
        Commands::Ci { job } => {
            match job {
                CiJob::Check => ci_check(),
                CiJob::Examples => ci_examples(),
                CiJob::Bench => ci_bench(),
                CiJob::All => {
                    ci_check();
                    ci_examples();
                    ci_bench();
                }
            }
            eprintln!("\nCI job passed.");
        }
    }
}
