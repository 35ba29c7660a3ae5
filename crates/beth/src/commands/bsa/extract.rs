use beth_bsa::{Archive, ExtractOptions, ReadOptions};
use clap::Args;
use miette::{Context, Result};
use std::path::PathBuf;
use tracing::info;

#[derive(Args)]
pub struct ExtractArgs {
    /// An input BSA/BA2 file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// Allow overwriting existing target files
    #[arg(long, default_value_t = false)]
    overwrite: bool,

    /// Cross-check the stored file name hashes before extracting
    #[arg(long, default_value_t = false)]
    verify_hashes: bool,
}

impl ExtractArgs {
    pub fn handle(&self) -> Result<()> {
        let archive = Archive::read(
            &self.file,
            ReadOptions::builder()
                .verify_hashes(self.verify_hashes)
                .build(),
        )
        .context(format!("path: {}", &self.file.display()))?;
        archive.verify_hashes()?;

        info!(
            "extracting {} files to {}",
            archive.file_count(),
            self.directory.display()
        );

        archive.extract_all(
            &self.directory,
            |percent, name| {
                info!("{percent:3}% {name}");
                true
            },
            ExtractOptions::builder().overwrite(self.overwrite).build(),
        )?;

        Ok(())
    }
}
