use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

/// eBPF 크레이트 경로 (workspace 루트 기준)
const EBPF_CRATE: &str = "crates/ebpf-engine/ebpf";

/// BPF 타겟 트리플
const BPF_TARGET: &str = "bpfel-unknown-none";

/// pktcount 빌드 태스크
#[derive(Parser)]
#[command(name = "xtask")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// eBPF 카운팅 프로그램 빌드
    BuildEbpf {
        /// 릴리스 모드로 빌드
        #[arg(long)]
        release: bool,
    },
    /// eBPF 오브젝트와 데몬을 빌드한 뒤 데몬 실행
    Run {
        /// 릴리스 모드로 빌드
        #[arg(long)]
        release: bool,
        /// 데몬 실행기 (XDP 어태치에는 root 권한 필요)
        #[arg(long, default_value = "sudo -E")]
        runner: String,
        /// 데몬에 전달할 인자
        #[arg(last = true)]
        run_args: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let root = workspace_root()?;

    match cli.command {
        Commands::BuildEbpf { release } => build_ebpf(&root, release),
        Commands::Run {
            release,
            runner,
            run_args,
        } => {
            build_ebpf(&root, release)?;
            run_daemon(&root, release, &runner, &run_args)
        }
    }
}

/// xtask 매니페스트의 부모 디렉터리
fn workspace_root() -> Result<PathBuf> {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .map(Path::to_path_buf)
        .context("xtask manifest has no parent directory")
}

fn profile(release: bool) -> &'static str {
    if release { "release" } else { "debug" }
}

/// BPF 오브젝트 경로 (`target/bpfel-unknown-none/{profile}/pktcount-ebpf`)
fn object_path(root: &Path, release: bool) -> PathBuf {
    root.join("target")
        .join(BPF_TARGET)
        .join(profile(release))
        .join("pktcount-ebpf")
}

fn build_ebpf(root: &Path, release: bool) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.current_dir(root.join(EBPF_CRATE));
    cmd.args(["+nightly", "build"])
        .arg(format!("--target={BPF_TARGET}"))
        .args(["-Z", "build-std=core"]);
    // workspace 밖 크레이트지만 오브젝트는 루트 target/ 아래에 둠
    cmd.arg("--target-dir").arg(root.join("target"));
    if release {
        cmd.arg("--release");
    }

    let status = cmd.status().context("failed to spawn cargo for eBPF build")?;
    if !status.success() {
        bail!("eBPF build failed: {status}");
    }

    println!(
        "eBPF build succeeded: {}",
        object_path(root, release).display()
    );
    Ok(())
}

fn run_daemon(root: &Path, release: bool, runner: &str, run_args: &[String]) -> Result<()> {
    let mut build = Command::new("cargo");
    build
        .current_dir(root)
        .args(["build", "-p", "pktcount-daemon", "--bin", "pktcount"]);
    if release {
        build.arg("--release");
    }
    let status = build.status().context("failed to spawn cargo build")?;
    if !status.success() {
        bail!("daemon build failed: {status}");
    }

    let binary = root.join("target").join(profile(release)).join("pktcount");
    let mut parts = runner.split_whitespace();
    let mut cmd = match parts.next() {
        Some(program) => {
            let mut cmd = Command::new(program);
            cmd.args(parts).arg(&binary);
            cmd
        }
        None => Command::new(&binary),
    };
    cmd.arg("--object").arg(object_path(root, release));
    cmd.args(run_args);

    let status = cmd
        .status()
        .with_context(|| format!("failed to run {}", binary.display()))?;
    if !status.success() {
        bail!("pktcount exited with {status}");
    }
    Ok(())
}
