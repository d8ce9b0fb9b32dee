use anyhow::{Context, Result};
use std::path::PathBuf;

/// The invoking user, mapped into the container so output files stay owned
/// by them instead of root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIdentity {
    pub uid: u32,
    pub gid: u32,
    pub home: PathBuf,
}

impl HostIdentity {
    pub fn current() -> Result<Self> {
        let uid = nix::unistd::getuid().as_raw();
        let gid = nix::unistd::getgid().as_raw();
        let home = dirs::home_dir().context("Could not find home directory")?;
        Ok(Self { uid, gid, home })
    }

    /// Value for `--user`
    pub fn user_spec(&self) -> String {
        format!("{}:{}", self.uid, self.gid)
    }
}
