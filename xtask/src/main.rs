use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(Parser, Debug)]
#[command(name = "xtask")]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Clean release build of the agent as one standalone executable in dist/
    Package {
        /// File name of the produced executable, without extension
        #[arg(long, default_value = "PrintAgentService")]
        name: String,
        /// Reuse previous build artifacts
        #[arg(long)]
        no_clean: bool,
        /// Cross-compilation target triple, e.g. x86_64-pc-windows-msvc
        #[arg(long)]
        target: Option<String>,
    },
    /// Run fmt+clippy
    Lint,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Commands::Package {
            name,
            no_clean,
            target,
        } => {
            let out = package(&name, !no_clean, target.as_deref())?;
            println!("Wrote {}", out.display());
        }
        Commands::Lint => {
            run("cargo", &["fmt", "--all"])?;
            run("cargo", &["clippy", "--all-targets", "--", "-Dwarnings"])?;
        }
    }
    Ok(())
}

fn package(name: &str, clean: bool, target: Option<&str>) -> Result<PathBuf> {
    if clean {
        run("cargo", &["clean", "-p", "print-agent", "--release"])?;
    }
    let mut args = vec!["build", "--release", "-p", "print-agent"];
    if let Some(t) = target {
        args.extend(["--target", t]);
    }
    run("cargo", &args)?;

    let windows = target.map_or(cfg!(windows), |t| t.contains("windows"));
    let built = built_binary(target, windows);
    let dist = PathBuf::from("dist");
    fs::create_dir_all(&dist)?;
    let out = dist.join(output_file_name(name, windows));
    fs::copy(&built, &out)
        .with_context(|| format!("copying {} to {}", built.display(), out.display()))?;
    Ok(out)
}

fn built_binary(target: Option<&str>, windows: bool) -> PathBuf {
    let mut dir = Path::new("target").to_path_buf();
    if let Some(t) = target {
        dir.push(t);
    }
    dir.join("release").join(output_file_name("print-agent", windows))
}

fn output_file_name(name: &str, windows: bool) -> String {
    if windows {
        format!("{name}.exe")
    } else {
        name.to_string()
    }
}

fn run(cmd: &str, args: &[&str]) -> Result<()> {
    println!("+ {} {}", cmd, args.join(" "));
    let st = std::process::Command::new(cmd).args(args).status()?;
    if !st.success() {
        anyhow::bail!("command failed")
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_paths() {
        assert_eq!(output_file_name("PrintAgentService", true), "PrintAgentService.exe");
        assert_eq!(output_file_name("PrintAgentService", false), "PrintAgentService");
        assert_eq!(
            built_binary(Some("x86_64-pc-windows-msvc"), true),
            Path::new("target/x86_64-pc-windows-msvc/release/print-agent.exe")
        );
        assert_eq!(built_binary(None, false), Path::new("target/release/print-agent"));
    }
}
