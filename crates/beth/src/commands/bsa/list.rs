use beth_bsa::{Archive, ReadOptions};
use clap::Args;
use miette::{Context, Result};
use std::path::PathBuf;

#[derive(Args)]
pub struct ListArgs {
    /// An input BSA/BA2 file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Only list folders
    #[arg(long, default_value_t = false)]
    folders: bool,

    /// Cross-check the stored file name hashes
    #[arg(long, default_value_t = false)]
    verify_hashes: bool,
}

impl ListArgs {
    pub fn handle(&self) -> Result<()> {
        let archive = Archive::read(
            &self.file,
            ReadOptions::builder()
                .verify_hashes(self.verify_hashes)
                .build(),
        )
        .context(format!("path: {}", &self.file.display()))?;

        if self.folders {
            for name in archive.folder_names() {
                println!("{name}");
            }
        } else {
            for file in archive.files() {
                println!("{:>12}  {}", file.size(), file.full_path());
            }
        }

        archive.verify_hashes()?;
        Ok(())
    }
}
