pub mod extract;
pub mod list;
pub mod repack;

#[derive(clap::Subcommand)]
pub enum BsaCommands {
    /// List the contents of an archive
    List(list::ListArgs),
    /// Extract an archive into a directory
    Extract(extract::ExtractArgs),
    /// Re-write an archive, optionally merging in loose files
    Repack(repack::RepackArgs),
}

impl BsaCommands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            BsaCommands::List(list) => list.handle(),
            BsaCommands::Extract(extract) => extract.handle(),
            BsaCommands::Repack(repack) => repack.handle(),
        }
    }
}
