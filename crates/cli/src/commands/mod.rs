mod init;
mod run;
mod validate;

pub use init::InitCommand;
pub use run::RunCommand;
pub use validate::ValidateCommand;
