//! Shared fakes for session tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use dockside::engine::{LaunchOptions, ListFilter, RuntimeType};
use dockside::{
    BindingResolver, ContainerHandle, EngineError, EngineGateway, EngineResult, ImageReference,
    Prompt, SessionRequest, SessionSettings,
};
use tokio_util::sync::CancellationToken;

/// One recorded engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Pull(String),
    List(ListFilter),
    Run { image: String, args: Vec<String> },
    Ports(String),
    Exec { id: String, shell: Vec<String> },
    Stop { id: String, timeout: u32 },
}

impl Call {
    pub fn is_run(&self) -> bool {
        matches!(self, Call::Run { .. })
    }

    pub fn is_stop(&self) -> bool {
        matches!(self, Call::Stop { .. })
    }

    pub fn is_exec(&self) -> bool {
        matches!(self, Call::Exec { .. })
    }
}

fn failed(command: &str, code: i32) -> EngineError {
    EngineError::CommandFailed {
        command: format!("docker {command}"),
        exit_code: Some(code),
        message: "simulated failure".to_string(),
    }
}

/// Engine that records calls and answers from canned data.
#[derive(Default)]
pub struct FakeEngine {
    calls: Mutex<Vec<Call>>,
    listing: Vec<ContainerHandle>,
    run_id: String,
    ports: String,
    fail_pull: Option<i32>,
    fail_list: Option<i32>,
    fail_run: Option<i32>,
    fail_ports: Option<i32>,
    fail_stop: Option<i32>,
    exec_exit: Option<i32>,
    /// Cancel this token and hang when the named operation is reached.
    interrupt_at: Option<(&'static str, CancellationToken)>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            run_id: "abc123".to_string(),
            ports: "22/tcp -> 0.0.0.0:32768".to_string(),
            ..Default::default()
        }
    }

    pub fn with_listing(mut self, listing: Vec<ContainerHandle>) -> Self {
        self.listing = listing;
        self
    }

    pub fn with_run_id(mut self, id: &str) -> Self {
        self.run_id = id.to_string();
        self
    }

    pub fn with_ports(mut self, ports: &str) -> Self {
        self.ports = ports.to_string();
        self
    }

    pub fn failing_pull(mut self, code: i32) -> Self {
        self.fail_pull = Some(code);
        self
    }

    pub fn failing_list(mut self, code: i32) -> Self {
        self.fail_list = Some(code);
        self
    }

    pub fn failing_run(mut self, code: i32) -> Self {
        self.fail_run = Some(code);
        self
    }

    pub fn failing_ports(mut self, code: i32) -> Self {
        self.fail_ports = Some(code);
        self
    }

    pub fn failing_stop(mut self, code: i32) -> Self {
        self.fail_stop = Some(code);
        self
    }

    pub fn with_exec_exit(mut self, code: i32) -> Self {
        self.exec_exit = Some(code);
        self
    }

    pub fn interrupt_at(mut self, operation: &'static str, token: CancellationToken) -> Self {
        self.interrupt_at = Some((operation, token));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    /// Cancel the token if `operation` is the configured interrupt point.
    fn trip(&self, operation: &str) -> bool {
        match self.interrupt_at {
            Some((at, ref token)) if at == operation => {
                token.cancel();
                true
            }
            _ => false,
        }
    }

    /// Interrupt and never finish, like a blocking command cut short.
    async fn maybe_interrupt(&self, operation: &str) {
        if self.trip(operation) {
            std::future::pending::<()>().await;
        }
    }
}

#[async_trait]
impl EngineGateway for FakeEngine {
    async fn pull_image(&self, image: &str) -> EngineResult<()> {
        self.record(Call::Pull(image.to_string()));
        self.maybe_interrupt("pull").await;
        match self.fail_pull {
            Some(code) => Err(failed("pull", code)),
            None => Ok(()),
        }
    }

    async fn list_containers(&self, filter: &ListFilter) -> EngineResult<Vec<ContainerHandle>> {
        self.record(Call::List(filter.clone()));
        match self.fail_list {
            Some(code) => Err(failed("ps", code)),
            None => Ok(self.listing.clone()),
        }
    }

    async fn run_container(&self, options: &LaunchOptions) -> EngineResult<ContainerHandle> {
        self.record(Call::Run {
            image: options.image.clone(),
            args: options.to_args(RuntimeType::Docker),
        });
        // `run` still completes: the interrupt lands while it is in flight.
        if self.trip("run") {
            tokio::task::yield_now().await;
        }
        match self.fail_run {
            Some(code) => Err(failed("run", code)),
            None => Ok(ContainerHandle::created(&self.run_id, options.image.clone())),
        }
    }

    async fn ports_of(&self, container: &ContainerHandle) -> EngineResult<String> {
        self.record(Call::Ports(container.id.clone()));
        self.maybe_interrupt("ports").await;
        match self.fail_ports {
            Some(code) => Err(failed("port", code)),
            None => Ok(self.ports.clone()),
        }
    }

    async fn exec_interactive_shell(
        &self,
        container: &ContainerHandle,
        shell: &[String],
    ) -> EngineResult<()> {
        self.record(Call::Exec {
            id: container.id.clone(),
            shell: shell.to_vec(),
        });
        self.maybe_interrupt("exec").await;
        match self.exec_exit {
            Some(code) if code != 0 => Err(failed("exec", code)),
            _ => Ok(()),
        }
    }

    async fn stop_container(
        &self,
        container: &ContainerHandle,
        timeout_seconds: u32,
    ) -> EngineResult<()> {
        self.record(Call::Stop {
            id: container.id.clone(),
            timeout: timeout_seconds,
        });
        match self.fail_stop {
            Some(code) => Err(failed("stop", code)),
            None => Ok(()),
        }
    }
}

/// Prompt that replays canned answers and records what was shown.
#[derive(Default)]
pub struct ScriptedPrompt {
    answers: VecDeque<String>,
    pub questions: Vec<String>,
    pub messages: Vec<String>,
}

impl ScriptedPrompt {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|a| a.to_string()).collect(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Prompt for ScriptedPrompt {
    async fn say(&mut self, message: &str) -> io::Result<()> {
        self.messages.push(message.to_string());
        Ok(())
    }

    async fn ask(&mut self, question: &str) -> io::Result<Option<String>> {
        self.questions.push(question.to_string());
        Ok(self.answers.pop_front())
    }
}

pub fn running(id: &str, image: &str, running_for: &str) -> ContainerHandle {
    ContainerHandle {
        id: id.to_string(),
        image: image.to_string(),
        running_for: running_for.to_string(),
        status: "Up 2 hours".to_string(),
    }
}

pub fn exited(id: &str, image: &str) -> ContainerHandle {
    ContainerHandle {
        id: id.to_string(),
        image: image.to_string(),
        running_for: "3 days ago".to_string(),
        status: "Exited (0) 2 days ago".to_string(),
    }
}

pub fn image() -> ImageReference {
    ImageReference::new("team/dev", "latest").unwrap()
}

pub fn settings() -> SessionSettings {
    SessionSettings {
        shell: vec!["bash".to_string(), "--login".to_string()],
        command: vec!["sleep".to_string(), "infinity".to_string()],
        security_opts: vec!["seccomp=unconfined".to_string()],
        stop_timeout: 0,
        stop_on_interrupt: true,
    }
}

pub fn resolver(home: &Path) -> BindingResolver {
    BindingResolver::new(home, "/home/ubuntu", "/home/ubuntu/workspace")
}

pub fn request(directory: &Path) -> SessionRequest {
    SessionRequest {
        directory: directory.to_path_buf(),
        image: image(),
        pull: true,
        mount_gitconfig: false,
        mount_ssh: false,
    }
}

/// Canonical form of `path` as the resolver reports it.
pub fn canonical(path: &Path) -> String {
    path.canonicalize().unwrap().to_str().unwrap().to_string()
}
