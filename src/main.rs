use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use crossterm::style::Stylize;
use inquire::Confirm;
use machotools::MachOFile;
use std::{fs::metadata, path::Path, process::exit};

#[derive(Parser, Debug)]
#[command(about = "Inspect and rewrite the dylib dependencies of Mach-O files")]
struct Args {
    /// Run without asking for confirmation
    #[arg(long, short('y'), global = true)]
    all_yes: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the libraries each architecture loads
    Deps {
        /// The Mach-O file to inspect
        input_file: String,
    },
    /// Replace the first dependency matching a regex in every architecture
    Change {
        /// The Mach-O file to be modified
        input_file: String,
        /// Regex matched against each dependency path
        pattern: String,
        /// The new dependency path
        dylib: String,
    },
    /// Print the install name of each architecture
    Id {
        /// The Mach-O file to inspect
        input_file: String,
    },
    /// Set the install name of each architecture
    SetId {
        /// The Mach-O file to be modified
        input_file: String,
        /// The new install name
        name: String,
    },
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(err) = args.run() {
        eprintln!("{} {:#}", "error:".red().bold(), err);
        exit(1);
    }
}

trait Utils {
    fn ask_for_confirmation(&self, msg: &str) -> Result<bool>;
    fn run(&self) -> Result<()>;
    fn print_dependencies(&self, input_file: &str) -> Result<()>;
    fn change_dependency(&self, input_file: &str, pattern: &str, dylib: &str) -> Result<()>;
    fn print_install_names(&self, input_file: &str) -> Result<()>;
    fn change_install_name(&self, input_file: &str, name: &str) -> Result<()>;
}

fn check_input(input_file: &str) -> Result<()> {
    if !Path::new(input_file).exists() {
        bail!("Input file `{}` does not exist", input_file);
    }
    if !metadata(input_file)?.is_file() {
        bail!("Input file `{}` is not a file", input_file);
    }
    Ok(())
}

/// Architecture labels of `input_file`, in header order.
fn arch_labels(input_file: &str) -> Result<Vec<String>> {
    let file = MachOFile::parse(input_file)
        .with_context(|| format!("failed to parse `{}`", input_file))?;
    let kind = if file.fat { "fat" } else { "thin" };
    println!("match {} file", kind.red());
    Ok(file
        .headers
        .iter()
        .map(|header| {
            let bits = if header.is_64 { "64-bit" } else { "32-bit" };
            format!("{} ({})", header.arch_name(), bits)
        })
        .collect())
}

impl Utils for Args {
    fn ask_for_confirmation(&self, msg: &str) -> Result<bool> {
        if self.all_yes {
            return Ok(true);
        }

        Ok(Confirm::new(msg).with_default(true).prompt()?)
    }

    fn run(&self) -> Result<()> {
        match &self.command {
            Command::Deps { input_file } => self.print_dependencies(input_file),
            Command::Change {
                input_file,
                pattern,
                dylib,
            } => self.change_dependency(input_file, pattern, dylib),
            Command::Id { input_file } => self.print_install_names(input_file),
            Command::SetId { input_file, name } => self.change_install_name(input_file, name),
        }
    }

    fn print_dependencies(&self, input_file: &str) -> Result<()> {
        check_input(input_file)?;
        let labels = arch_labels(input_file)?;
        let deps = machotools::dependencies(input_file)
            .with_context(|| format!("failed to read dependencies of `{}`", input_file))?;

        for (label, deps) in labels.iter().zip(deps) {
            println!("{}", label.as_str().red());
            for dep in deps {
                println!("    {}", dep);
            }
        }
        Ok(())
    }

    fn change_dependency(&self, input_file: &str, pattern: &str, dylib: &str) -> Result<()> {
        check_input(input_file)?;
        let labels = arch_labels(input_file)?;

        if !Path::new(dylib).exists()
            && !dylib.starts_with('@')
            && !self.ask_for_confirmation(&format!(
                "Dylib file `{}` does not exist, continue?",
                dylib
            ))?
        {
            return Ok(());
        }
        if !self.ask_for_confirmation(&format!(
            "Input file `{}` will be modified in place, continue?",
            input_file
        ))? {
            return Ok(());
        }

        let changed = machotools::change_dependency(input_file, pattern, dylib)
            .with_context(|| format!("failed to change dependency of `{}`", input_file))?;
        if changed == 0 {
            println!(
                "{} no dependency matches `{}` in {} arch(s)",
                "warning:".yellow().bold(),
                pattern,
                labels.len()
            );
        } else {
            println!("changed {} of {} arch(s)", changed, labels.len());
        }

        println!("{}", "Done!".green().bold());
        Ok(())
    }

    fn print_install_names(&self, input_file: &str) -> Result<()> {
        check_input(input_file)?;
        let labels = arch_labels(input_file)?;
        let names = machotools::install_names(input_file)
            .with_context(|| format!("failed to read install names of `{}`", input_file))?;

        for (label, name) in labels.iter().zip(names) {
            match name {
                Some(name) => println!("{}: {}", label.as_str().red(), name),
                None => println!("{}: {}", label.as_str().red(), "no install name".negative()),
            }
        }
        Ok(())
    }

    fn change_install_name(&self, input_file: &str, name: &str) -> Result<()> {
        check_input(input_file)?;
        let labels = arch_labels(input_file)?;

        if !self.ask_for_confirmation(&format!(
            "Input file `{}` will be modified in place, continue?",
            input_file
        ))? {
            return Ok(());
        }

        let changed = machotools::change_install_name(input_file, name)
            .with_context(|| format!("failed to change install name of `{}`", input_file))?;
        if changed == 0 {
            println!(
                "{} `{}` has no install name in any of its {} arch(s)",
                "warning:".yellow().bold(),
                input_file,
                labels.len()
            );
        } else {
            println!("changed {} of {} arch(s)", changed, labels.len());
        }

        println!("{}", "Done!".green().bold());
        Ok(())
    }
}
