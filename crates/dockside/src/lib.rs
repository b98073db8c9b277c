//! Attach a shell to a throwaway development container bound to a host
//! directory.
//!
//! A session reuses a running container that already mounts the directory if
//! the user agrees, and otherwise starts a fresh one, attaches a login shell,
//! and stops the container again once the shell exits.

pub mod binding;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod image;
pub mod interrupt;
pub mod negotiate;
pub mod session;

pub use binding::{AuxiliaryKind, AuxiliaryMount, BindingError, BindingResolver, DirectoryBinding};
pub use config::AppConfig;
pub use engine::{ContainerHandle, EngineError, EngineGateway, EngineResult, EngineRuntime};
pub use error::{SessionError, SessionResult};
pub use image::ImageReference;
pub use interrupt::InterruptController;
pub use negotiate::{Decision, Negotiation, Negotiator, Prompt, TerminalPrompt};
pub use session::{
    Lifecycle, LifecycleState, Session, SessionOutcome, SessionRequest, SessionSettings,
    ShellStatus,
};
