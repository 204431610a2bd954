use crate::expr::{Expr, Pseudo};

pub const AGENT_PATH: &str = "/opt/aws/bin/cfn-init";

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("Phase {0} declared twice")]
    DuplicatePhase(String),

    #[error("Command {command} declared twice in phase {phase}")]
    DuplicateCommand { phase: String, command: String },

    #[error("Default order names unknown phase {0}")]
    UnknownPhase(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub name: String,
    pub command: String,
    pub cwd: Option<String>,
    pub env: Vec<(String, String)>,
}

impl Command {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            cwd: None,
            env: Vec::new(),
        }
    }

    pub fn cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    fn to_metadata(&self) -> Expr {
        let mut fields = vec![(String::from("command"), Expr::str(&self.command))];
        if !self.env.is_empty() {
            fields.push((
                String::from("env"),
                Expr::object(self.env.iter().map(|(k, v)| (k.clone(), v.clone()))),
            ));
        }
        if let Some(cwd) = &self.cwd {
            fields.push((String::from("cwd"), Expr::str(cwd)));
        }
        Expr::Object(fields)
    }

    /// The command as a single shell line, run in a subshell so its working
    /// directory and environment stay local to it.
    pub fn to_shell(&self) -> String {
        let mut steps = Vec::new();
        if let Some(cwd) = &self.cwd {
            steps.push(format!("cd {}", shell_quote(cwd)));
        }
        for (key, value) in &self.env {
            steps.push(format!("export {}={}", key, shell_quote(value)));
        }
        if steps.is_empty() {
            return self.command.clone();
        }
        steps.push(self.command.clone());
        format!("({})", steps.join(" && "))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PackageSet {
    pub manager: String,
    pub names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Phase {
    pub name: String,
    pub packages: Vec<PackageSet>,
    pub commands: Vec<Command>,
}

impl Phase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            packages: Vec::new(),
            commands: Vec::new(),
        }
    }

    pub fn package(mut self, manager: &str, name: impl Into<String>) -> Self {
        let name = name.into();
        match self.packages.iter_mut().find(|set| set.manager == manager) {
            Some(set) => set.names.push(name),
            None => self.packages.push(PackageSet {
                manager: manager.to_string(),
                names: vec![name],
            }),
        }
        self
    }

    pub fn command(mut self, command: Command) -> Result<Self, Error> {
        if self.commands.iter().any(|c| c.name == command.name) {
            return Err(Error::DuplicateCommand {
                phase: self.name,
                command: command.name,
            });
        }
        self.commands.push(command);
        return Ok(self);
    }

    fn to_metadata(&self) -> Expr {
        let mut fields = Vec::new();
        if !self.packages.is_empty() {
            let managers = self.packages.iter().map(|set| {
                let names = set
                    .names
                    .iter()
                    .map(|name| (name.clone(), Expr::List(Vec::new())));
                (set.manager.clone(), Expr::object(names))
            });
            fields.push((String::from("packages"), Expr::object(managers)));
        }
        if !self.commands.is_empty() {
            let commands = self
                .commands
                .iter()
                .map(|command| (command.name.clone(), command.to_metadata()));
            fields.push((String::from("commands"), Expr::object(commands)));
        }
        Expr::Object(fields)
    }

    fn shell_lines(&self) -> Vec<String> {
        let mut lines = vec![format!("# phase: {}", self.name)];
        for set in &self.packages {
            lines.push(install_line(set));
        }
        for command in &self.commands {
            lines.push(command.to_shell());
        }
        lines
    }
}

/// A bootstrap command set: named phases plus the order the agent runs
/// them in by default.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Init {
    phases: Vec<Phase>,
    default_order: Option<Vec<String>>,
}

impl Init {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(mut self, phase: Phase) -> Result<Self, Error> {
        if self.phases.iter().any(|p| p.name == phase.name) {
            return Err(Error::DuplicatePhase(phase.name));
        }
        self.phases.push(phase);
        return Ok(self);
    }

    pub fn default_order<I, S>(mut self, order: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let order: Vec<String> = order.into_iter().map(Into::into).collect();
        if let Some(unknown) = order
            .iter()
            .find(|name| !self.phases.iter().any(|p| &p.name == *name))
        {
            return Err(Error::UnknownPhase(unknown.clone()));
        }
        self.default_order = Some(order);
        return Ok(self);
    }

    pub fn ordered_phases(&self) -> Vec<&Phase> {
        match &self.default_order {
            Some(order) => order
                .iter()
                .filter_map(|name| self.phases.iter().find(|p| &p.name == name))
                .collect(),
            None => self.phases.iter().collect(),
        }
    }

    /// Structured form read by the agent on the instance.
    pub fn to_metadata(&self) -> Expr {
        let order: Vec<Expr> = self
            .ordered_phases()
            .iter()
            .map(|p| Expr::str(&p.name))
            .collect();

        let mut fields = vec![(
            String::from("configSets"),
            Expr::object([("default", Expr::List(order))]),
        )];
        for phase in &self.phases {
            fields.push((phase.name.clone(), phase.to_metadata()));
        }

        Expr::object([("AWS::CloudFormation::Init", Expr::Object(fields))])
    }

    pub fn script_lines(&self) -> Vec<String> {
        self.ordered_phases()
            .into_iter()
            .flat_map(|phase| phase.shell_lines())
            .collect()
    }

    /// The instance boot payload: `prelude` (agent installation), the
    /// flattened phases, then the agent invocation for `resource`.
    pub fn boot_script(&self, prelude: &[&str], resource: &str) -> Expr {
        let mut parts: Vec<Expr> = vec![Expr::from("#!/bin/bash"), Expr::from("\n")];
        let lines = prelude
            .iter()
            .map(|line| line.to_string())
            .chain(self.script_lines());
        for line in lines {
            parts.push(Expr::Str(line));
            parts.push(Expr::from("\n"));
        }

        parts.extend([
            Expr::str(format!("{} -v", AGENT_PATH)),
            Expr::from(" --region "),
            Expr::Pseudo(Pseudo::Region),
            Expr::from(" --stack "),
            Expr::Pseudo(Pseudo::StackId),
            Expr::str(format!(" --resource {}", resource)),
            Expr::from("\n"),
        ]);

        Expr::base64(Expr::Join {
            separator: String::new(),
            parts,
        })
    }
}

fn install_line(set: &PackageSet) -> String {
    let names: Vec<String> = set.names.iter().map(|n| shell_quote(n)).collect();
    match set.manager.as_str() {
        "apt" => format!("apt-get install -y {}", names.join(" ")),
        "python" => format!("pip install {}", names.join(" ")),
        manager => format!("{} -y install {}", manager, names.join(" ")),
    }
}

fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./~:=@%+,".contains(c));
    if safe {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}
