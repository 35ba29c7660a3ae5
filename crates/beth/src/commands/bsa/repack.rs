use beth_bsa::{Archive, ReadOptions};
use clap::Args;
use miette::{miette, Context, IntoDiagnostic, Result};
use std::path::PathBuf;
use tracing::info;
use walkdir::WalkDir;

#[derive(Args)]
pub struct RepackArgs {
    /// An input BSA file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target BSA file
    #[arg(short, long, value_name = "FILE")]
    target: PathBuf,

    /// A directory of loose files to merge in
    #[arg(long, value_name = "DIR")]
    add: Option<PathBuf>,

    /// Compress merged loose files
    #[arg(long, default_value_t = false)]
    compress: bool,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl RepackArgs {
    pub fn handle(&self) -> Result<()> {
        if !self.overwrite && self.target.exists() {
            return Err(miette!("target {} already exists", self.target.display()));
        }

        let mut archive = Archive::read(&self.file, ReadOptions::default())
            .context(format!("path: {}", &self.file.display()))?;

        if let Some(directory) = &self.add {
            for entry in WalkDir::new(directory)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| !e.file_type().is_dir())
            {
                let name = entry
                    .path()
                    .strip_prefix(directory)
                    .into_diagnostic()?
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("\\");
                info!("merging {name}");
                archive.create_file(&name, entry.path(), self.compress);
            }
        }

        info!("writing {}", self.target.display());
        archive.write(&self.target)?;

        Ok(())
    }
}
