//! In-memory port implementations for unit tests

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Mutex;

use crate::domain::result::{Error, Result};
use crate::domain::{DatabaseTarget, ToolCommand, ToolOutput, UserConfig};
use crate::ports::{CommandRunner, DatabaseAdmin, UserDirectory};

pub const TEST_KEY: &str = "cw_0x689RpI-jtRR7oE8h_eQsKImvJapLeSbXpwF4e4=";

pub fn sample_user() -> UserConfig {
    UserConfig {
        username: "denys".to_string(),
        password: "secret".to_string(),
        dbname: "appdb".to_string(),
        dbuser: "postgres".to_string(),
        db_password: "pgpass".to_string(),
        encryption_key: TEST_KEY.to_string(),
        extra: Default::default(),
    }
}

enum Scripted {
    Output(ToolOutput),
    Missing,
}

/// Records every command; answers success unless told otherwise
#[derive(Default)]
pub struct FakeRunner {
    scripted: Mutex<HashMap<String, Scripted>>,
    calls: Mutex<Vec<ToolCommand>>,
    /// Content of the file named by the last argument, when it exists
    file_snapshots: Mutex<Vec<(String, String)>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, program: &str, exit_code: i32, stdout: &str, stderr: &str) {
        self.scripted.lock().unwrap().insert(
            program.to_string(),
            Scripted::Output(ToolOutput {
                exit_code: Some(exit_code),
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            }),
        );
    }

    pub fn missing(&self, program: &str) {
        self.scripted
            .lock()
            .unwrap()
            .insert(program.to_string(), Scripted::Missing);
    }

    pub fn calls(&self) -> Vec<ToolCommand> {
        self.calls.lock().unwrap().clone()
    }

    pub fn programs(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.program).collect()
    }

    pub fn file_snapshots(&self) -> Vec<(String, String)> {
        self.file_snapshots.lock().unwrap().clone()
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, command: &ToolCommand) -> Result<ToolOutput> {
        self.calls.lock().unwrap().push(command.clone());

        if let Some(last) = command.args.last() {
            if Path::new(last).is_file() {
                if let Ok(content) = std::fs::read_to_string(last) {
                    self.file_snapshots
                        .lock()
                        .unwrap()
                        .push((command.program.clone(), content));
                }
            }
        }

        match self.scripted.lock().unwrap().get(&command.program) {
            Some(Scripted::Output(output)) => Ok(output.clone()),
            Some(Scripted::Missing) => Err(Error::Subprocess {
                tool: command.program.clone(),
                exit_code: None,
                stderr: format!("could not start {}", command.program),
            }),
            None => Ok(ToolOutput {
                exit_code: Some(0),
                stdout: String::new(),
                stderr: String::new(),
            }),
        }
    }
}

/// Catalog kept in memory; tracks connection balance
#[derive(Default)]
pub struct FakeAdmin {
    databases: Mutex<BTreeSet<String>>,
    pub refuse_connections: bool,
    opened: Mutex<u32>,
    closed: Mutex<u32>,
}

impl FakeAdmin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_database(name: &str) -> Self {
        let admin = Self::default();
        admin.databases.lock().unwrap().insert(name.to_string());
        admin
    }

    pub fn databases(&self) -> Vec<String> {
        self.databases.lock().unwrap().iter().cloned().collect()
    }

    pub fn open_connections(&self) -> u32 {
        *self.opened.lock().unwrap() - *self.closed.lock().unwrap()
    }

    fn connect(&self) -> Result<()> {
        if self.refuse_connections {
            return Err(Error::DatabaseConnection("connection refused".to_string()));
        }
        *self.opened.lock().unwrap() += 1;
        Ok(())
    }

    fn release(&self) {
        *self.closed.lock().unwrap() += 1;
    }
}

impl DatabaseAdmin for FakeAdmin {
    fn database_exists(&self, target: &DatabaseTarget) -> Result<bool> {
        self.connect()?;
        let exists = self.databases.lock().unwrap().contains(&target.dbname);
        self.release();
        Ok(exists)
    }

    fn create_database(&self, target: &DatabaseTarget) -> Result<()> {
        self.connect()?;
        let inserted = self.databases.lock().unwrap().insert(target.dbname.clone());
        self.release();
        if inserted {
            Ok(())
        } else {
            Err(Error::DatabaseConnection(format!(
                "database \"{}\" already exists",
                target.dbname
            )))
        }
    }
}

/// Returns a fixed user for every call, or a fixed failure
pub struct FakeDirectory {
    pub user: UserConfig,
    pub reject: bool,
    calls: Mutex<Vec<String>>,
}

impl FakeDirectory {
    pub fn new(user: UserConfig) -> Self {
        Self {
            user,
            reject: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn answer(&self, call: &str, username: &str) -> Result<UserConfig> {
        self.calls.lock().unwrap().push(format!("{}:{}", call, username));
        if self.reject {
            return Err(Error::UserService {
                status: Some(401),
                message: "invalid credentials".to_string(),
            });
        }
        Ok(UserConfig {
            username: username.to_string(),
            ..self.user.clone()
        })
    }
}

impl UserDirectory for FakeDirectory {
    fn create_user(&self, username: &str, _password: &str) -> Result<UserConfig> {
        self.answer("create", username)
    }

    fn find_user(&self, username: &str, _password: &str) -> Result<UserConfig> {
        self.answer("find", username)
    }
}
