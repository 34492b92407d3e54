// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Structural validation of the broker configuration document.
//!
//! Validation runs on the raw `serde_yaml::Value` before any typed deserialization
//! and before any deployment side effect. It walks the document against a fixed
//! schema and accumulates every problem it finds, so an operator sees all issues at
//! once instead of fixing them one by one.
//!
//! Each error carries the location of the offending field in JSON-path notation,
//! e.g. `$.hosts[1].workers[0].deploy_type`.
//!
//! # Checks
//!
//! 1. **Shape**: sections are mappings/sequences, scalars have the right type
//! 2. **Required fields per agent kind**: message broker address/port/credentials,
//!    database address/port, worker names, docker images for docker workers
//! 3. **Host syntax**: `local`, an IP literal, or an RFC 1123 host name
//! 4. **Remote access**: remote agents that must be deployed need SSH settings;
//!    password authentication is rejected
//! 5. **Unknown fields**: anything the schema does not name is an error

use std::net::IpAddr;

use serde_yaml::{Mapping, Value};

use crate::config::loader::is_local_address;
use crate::errors::ValidationError;

const ROOT_KEYS: &[&str] = &[
    "process_queue",
    "database",
    "hosts",
    "logs_dir",
    "worker_command",
    "timeouts",
];
const QUEUE_KEYS: &[&str] = &[
    "address",
    "port",
    "credentials",
    "ssh",
    "skip_deployment",
    "image",
    "stream",
];
const DATABASE_KEYS: &[&str] = &[
    "address",
    "port",
    "credentials",
    "ssh",
    "skip_deployment",
    "image",
];
const CREDENTIAL_KEYS: &[&str] = &["username", "password"];
const SSH_KEYS: &[&str] = &["username", "path_to_privkey", "port"];
const HOST_KEYS: &[&str] = &["address", "username", "path_to_privkey", "ssh_port", "workers"];
const WORKER_KEYS: &[&str] = &["name", "number_of_instance", "deploy_type", "image"];
const TIMEOUT_KEYS: &[&str] = &["agent_stop_seconds", "publish_attempts", "publish_backoff_ms"];
const DEPLOY_TYPES: &[&str] = &["native", "docker"];

/// Validates a raw configuration document against the broker schema.
///
/// Returns every problem found; `Ok(())` means the document can be deserialized
/// into a [`BrokerConfig`](crate::config::BrokerConfig) and deployed.
pub fn validate_config(raw: &Value) -> Result<(), Vec<ValidationError>> {
    let mut validator = Validator::default();
    validator.root(raw);

    if validator.errors.is_empty() {
        Ok(())
    } else {
        Err(validator.errors)
    }
}

#[derive(Default)]
struct Validator {
    errors: Vec<ValidationError>,
}

impl Validator {
    fn root(&mut self, raw: &Value) {
        let Some(root) = self.mapping(raw, "$") else {
            return;
        };
        self.known_keys(root, "$", ROOT_KEYS);

        match self.required(root, "$", "process_queue") {
            Some(queue) => self.queue(queue, "$.process_queue"),
            None => {}
        }

        if let Some(database) = root.get("database") {
            if !database.is_null() {
                self.database(database, "$.database");
            }
        }

        if let Some(hosts) = self.required(root, "$", "hosts") {
            if let Some(hosts) = self.sequence(hosts, "$.hosts") {
                for (index, host) in hosts.iter().enumerate() {
                    self.host(host, &format!("$.hosts[{}]", index));
                }
            }
        }

        if let Some(value) = root.get("logs_dir") {
            self.string(value, "$.logs_dir");
        }
        if let Some(value) = root.get("worker_command") {
            self.non_empty_string(value, "$.worker_command");
        }
        if let Some(timeouts) = root.get("timeouts") {
            self.timeouts(timeouts, "$.timeouts");
        }
    }

    fn queue(&mut self, value: &Value, path: &str) {
        let Some(queue) = self.mapping(value, path) else {
            return;
        };
        self.known_keys(queue, path, QUEUE_KEYS);

        let address = self.host_address(queue, path);
        if let Some(port) = self.required(queue, path, "port") {
            self.port(port, &format!("{}.port", path));
        }
        if let Some(credentials) = self.required(queue, path, "credentials") {
            self.credentials(credentials, &format!("{}.credentials", path));
        }
        if let Some(stream) = queue.get("stream") {
            let stream_path = format!("{}.stream", path);
            if let Some(name) = self.non_empty_string(stream, &stream_path) {
                if name.contains(|c: char| c.is_whitespace() || matches!(c, '.' | '*' | '>')) {
                    self.invalid(
                        &stream_path,
                        "stream names may not contain whitespace, '.', '*' or '>'",
                    );
                }
            }
        }
        if let Some(image) = queue.get("image") {
            self.non_empty_string(image, &format!("{}.image", path));
        }
        self.remote_access(queue, path, address);
    }

    fn database(&mut self, value: &Value, path: &str) {
        let Some(database) = self.mapping(value, path) else {
            return;
        };
        self.known_keys(database, path, DATABASE_KEYS);

        let address = self.host_address(database, path);
        if let Some(port) = self.required(database, path, "port") {
            self.port(port, &format!("{}.port", path));
        }
        if let Some(credentials) = database.get("credentials") {
            self.credentials(credentials, &format!("{}.credentials", path));
        }
        if let Some(image) = database.get("image") {
            self.non_empty_string(image, &format!("{}.image", path));
        }
        self.remote_access(database, path, address);
    }

    /// Remote agents that will be deployed need SSH access.
    fn remote_access(&mut self, section: &Mapping, path: &str, address: Option<&str>) {
        let skip = match section.get("skip_deployment") {
            Some(value) => self
                .boolean(value, &format!("{}.skip_deployment", path))
                .unwrap_or(false),
            None => false,
        };

        match section.get("ssh") {
            Some(ssh) => self.ssh(ssh, &format!("{}.ssh", path)),
            None => {
                let remote = address.is_some_and(|a| !is_local_address(a));
                if remote && !skip {
                    self.errors.push(ValidationError::MissingField {
                        path: format!("{}.ssh", path),
                    });
                }
            }
        }
    }

    fn credentials(&mut self, value: &Value, path: &str) {
        let Some(credentials) = self.mapping(value, path) else {
            return;
        };
        self.known_keys(credentials, path, CREDENTIAL_KEYS);
        for key in CREDENTIAL_KEYS {
            if let Some(field) = self.required(credentials, path, key) {
                self.non_empty_string(field, &format!("{}.{}", path, key));
            }
        }
    }

    fn ssh(&mut self, value: &Value, path: &str) {
        let Some(ssh) = self.mapping(value, path) else {
            return;
        };
        if ssh.get("password").is_some() {
            self.invalid(
                &format!("{}.password", path),
                "SSH password authentication is not supported; use path_to_privkey or an ssh-agent",
            );
        }
        let allowed: Vec<&str> = SSH_KEYS.iter().copied().chain(["password"]).collect();
        self.known_keys(ssh, path, &allowed);

        if let Some(username) = self.required(ssh, path, "username") {
            self.non_empty_string(username, &format!("{}.username", path));
        }
        if let Some(key) = ssh.get("path_to_privkey") {
            self.non_empty_string(key, &format!("{}.path_to_privkey", path));
        }
        if let Some(port) = ssh.get("port") {
            self.port(port, &format!("{}.port", path));
        }
    }

    fn host(&mut self, value: &Value, path: &str) {
        let Some(host) = self.mapping(value, path) else {
            return;
        };
        if host.get("password").is_some() {
            self.invalid(
                &format!("{}.password", path),
                "SSH password authentication is not supported; use path_to_privkey or an ssh-agent",
            );
        }
        let allowed: Vec<&str> = HOST_KEYS.iter().copied().chain(["password"]).collect();
        self.known_keys(host, path, &allowed);

        let address = self.host_address(host, path);
        let remote = address.is_some_and(|a| !is_local_address(a));

        match host.get("username") {
            Some(username) => {
                self.non_empty_string(username, &format!("{}.username", path));
            }
            None if remote => self.errors.push(ValidationError::MissingField {
                path: format!("{}.username", path),
            }),
            None => {}
        }
        if let Some(key) = host.get("path_to_privkey") {
            self.non_empty_string(key, &format!("{}.path_to_privkey", path));
        }
        if let Some(port) = host.get("ssh_port") {
            self.port(port, &format!("{}.ssh_port", path));
        }

        let Some(workers) = self.required(host, path, "workers") else {
            return;
        };
        let workers_path = format!("{}.workers", path);
        let Some(workers) = self.sequence(workers, &workers_path) else {
            return;
        };
        if workers.is_empty() {
            self.invalid(&workers_path, "at least one worker is required");
        }
        for (index, worker) in workers.iter().enumerate() {
            self.worker(worker, &format!("{}[{}]", workers_path, index));
        }
    }

    fn worker(&mut self, value: &Value, path: &str) {
        let Some(worker) = self.mapping(value, path) else {
            return;
        };
        self.known_keys(worker, path, WORKER_KEYS);

        if let Some(name) = self.required(worker, path, "name") {
            let name_path = format!("{}.name", path);
            if let Some(name) = self.non_empty_string(name, &name_path) {
                if name.contains(char::is_whitespace) {
                    self.invalid(&name_path, "processor names may not contain whitespace");
                }
            }
        }

        if let Some(instances) = worker.get("number_of_instance") {
            let instances_path = format!("{}.number_of_instance", path);
            if let Some(count) = self.integer(instances, &instances_path) {
                if count < 1 {
                    self.invalid(&instances_path, "must be at least 1");
                }
            }
        }

        let mut docker = false;
        if let Some(deploy_type) = worker.get("deploy_type") {
            let deploy_path = format!("{}.deploy_type", path);
            if let Some(kind) = self.string(deploy_type, &deploy_path) {
                if !DEPLOY_TYPES.contains(&kind) {
                    self.invalid(
                        &deploy_path,
                        &format!("must be one of: {}", DEPLOY_TYPES.join(", ")),
                    );
                }
                docker = kind == "docker";
            }
        }

        match worker.get("image") {
            Some(image) => {
                self.non_empty_string(image, &format!("{}.image", path));
            }
            None if docker => self.errors.push(ValidationError::MissingField {
                path: format!("{}.image", path),
            }),
            None => {}
        }
    }

    fn timeouts(&mut self, value: &Value, path: &str) {
        let Some(timeouts) = self.mapping(value, path) else {
            return;
        };
        self.known_keys(timeouts, path, TIMEOUT_KEYS);
        for key in ["agent_stop_seconds", "publish_attempts"] {
            if let Some(field) = timeouts.get(key) {
                let field_path = format!("{}.{}", path, key);
                if let Some(n) = self.integer(field, &field_path) {
                    if n < 1 {
                        self.invalid(&field_path, "must be at least 1");
                    }
                }
            }
        }
        if let Some(field) = timeouts.get("publish_backoff_ms") {
            let field_path = format!("{}.publish_backoff_ms", path);
            if let Some(n) = self.integer(field, &field_path) {
                if n < 0 {
                    self.invalid(&field_path, "must not be negative");
                }
            }
        }
    }

    fn host_address<'a>(&mut self, section: &'a Mapping, path: &str) -> Option<&'a str> {
        let value = self.required(section, path, "address")?;
        let address_path = format!("{}.address", path);
        let address = self.non_empty_string(value, &address_path)?;
        if !is_valid_host(address) {
            self.invalid(
                &address_path,
                &format!("'{}' is not a valid host name or IP address", address),
            );
            return None;
        }
        Some(address)
    }

    fn port(&mut self, value: &Value, path: &str) {
        if let Some(port) = self.integer(value, path) {
            if !(1..=65535).contains(&port) {
                self.invalid(path, "must be a port number between 1 and 65535");
            }
        }
    }

    fn required<'a>(&mut self, section: &'a Mapping, path: &str, key: &str) -> Option<&'a Value> {
        match section.get(key) {
            Some(value) if !value.is_null() => Some(value),
            _ => {
                self.errors.push(ValidationError::MissingField {
                    path: format!("{}.{}", path, key),
                });
                None
            }
        }
    }

    fn known_keys(&mut self, section: &Mapping, path: &str, allowed: &[&str]) {
        for key in section.keys() {
            match key.as_str() {
                Some(name) if allowed.contains(&name) => {}
                Some(name) => self.errors.push(ValidationError::UnknownField {
                    path: format!("{}.{}", path, name),
                }),
                None => self.errors.push(ValidationError::InvalidType {
                    path: path.to_string(),
                    expected: "string keys",
                }),
            }
        }
    }

    fn mapping<'a>(&mut self, value: &'a Value, path: &str) -> Option<&'a Mapping> {
        let mapping = value.as_mapping();
        if mapping.is_none() {
            self.type_error(path, "a mapping");
        }
        mapping
    }

    fn sequence<'a>(&mut self, value: &'a Value, path: &str) -> Option<&'a Vec<Value>> {
        let sequence = value.as_sequence();
        if sequence.is_none() {
            self.type_error(path, "a sequence");
        }
        sequence
    }

    fn string<'a>(&mut self, value: &'a Value, path: &str) -> Option<&'a str> {
        let string = value.as_str();
        if string.is_none() {
            self.type_error(path, "a string");
        }
        string
    }

    fn non_empty_string<'a>(&mut self, value: &'a Value, path: &str) -> Option<&'a str> {
        let string = self.string(value, path)?;
        if string.trim().is_empty() {
            self.invalid(path, "must not be empty");
            return None;
        }
        Some(string)
    }

    fn integer(&mut self, value: &Value, path: &str) -> Option<i64> {
        let integer = value.as_i64();
        if integer.is_none() {
            self.type_error(path, "an integer");
        }
        integer
    }

    fn boolean(&mut self, value: &Value, path: &str) -> Option<bool> {
        let boolean = value.as_bool();
        if boolean.is_none() {
            self.type_error(path, "a boolean");
        }
        boolean
    }

    fn type_error(&mut self, path: &str, expected: &'static str) {
        self.errors.push(ValidationError::InvalidType {
            path: path.to_string(),
            expected,
        });
    }

    fn invalid(&mut self, path: &str, reason: &str) {
        self.errors.push(ValidationError::InvalidValue {
            path: path.to_string(),
            reason: reason.to_string(),
        });
    }
}

/// `local`, an IP literal, or an RFC 1123 host name
fn is_valid_host(address: &str) -> bool {
    if address == "local" || address.parse::<IpAddr>().is_ok() {
        return true;
    }
    if address.len() > 253 {
        return false;
    }
    address.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn error_paths(yaml: &str) -> Vec<String> {
        validate_config(&parse(yaml))
            .unwrap_err()
            .iter()
            .map(|e| e.path().to_string())
            .collect()
    }

    const VALID: &str = r#"
process_queue:
  address: localhost
  port: 4222
  credentials: {username: admin, password: admin}
database:
  address: db.internal
  port: 27017
  skip_deployment: true
hosts:
  - address: localhost
    workers:
      - name: ocrd-dummy
  - address: 10.0.0.12
    username: cloud
    path_to_privkey: /home/cloud/.ssh/id_rsa
    workers:
      - name: ocrd-cis-ocropy-binarize
        number_of_instance: 3
      - name: ocrd-tesserocr-recognize
        deploy_type: docker
        image: ocrd/tesserocr:latest
timeouts:
  agent_stop_seconds: 5
"#;

    #[test]
    fn accepts_valid_document() {
        assert_eq!(validate_config(&parse(VALID)), Ok(()));
    }

    #[test]
    fn root_must_be_a_mapping() {
        let errors = validate_config(&parse("- a\n- b\n")).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::InvalidType {
                path: "$".to_string(),
                expected: "a mapping",
            }]
        );
    }

    #[test]
    fn reports_missing_required_sections() {
        let paths = error_paths("logs_dir: /tmp/logs\n");
        assert_eq!(paths, vec!["$.process_queue", "$.hosts"]);
    }

    #[test]
    fn table_driven_field_errors() {
        struct TestCase {
            name: &'static str,
            yaml: &'static str,
            expected_path: &'static str,
        }

        let test_cases = vec![
            TestCase {
                name: "port out of range",
                yaml: r#"
process_queue: {address: localhost, port: 70000, credentials: {username: a, password: b}}
hosts: []
"#,
                expected_path: "$.process_queue.port",
            },
            TestCase {
                name: "bad host syntax",
                yaml: r#"
process_queue: {address: "not a host!", port: 4222, credentials: {username: a, password: b}}
hosts: []
"#,
                expected_path: "$.process_queue.address",
            },
            TestCase {
                name: "remote queue without ssh",
                yaml: r#"
process_queue: {address: mq.example.org, port: 4222, credentials: {username: a, password: b}}
hosts: []
"#,
                expected_path: "$.process_queue.ssh",
            },
            TestCase {
                name: "empty password",
                yaml: r#"
process_queue: {address: localhost, port: 4222, credentials: {username: a, password: ""}}
hosts: []
"#,
                expected_path: "$.process_queue.credentials.password",
            },
            TestCase {
                name: "remote host without username",
                yaml: r#"
process_queue: {address: localhost, port: 4222, credentials: {username: a, password: b}}
hosts:
  - address: worker.example.org
    workers: [{name: ocrd-dummy}]
"#,
                expected_path: "$.hosts[0].username",
            },
            TestCase {
                name: "ssh password rejected",
                yaml: r#"
process_queue: {address: localhost, port: 4222, credentials: {username: a, password: b}}
hosts:
  - address: worker.example.org
    username: cloud
    password: secret
    workers: [{name: ocrd-dummy}]
"#,
                expected_path: "$.hosts[0].password",
            },
            TestCase {
                name: "unknown deploy type",
                yaml: r#"
process_queue: {address: localhost, port: 4222, credentials: {username: a, password: b}}
hosts:
  - address: localhost
    workers: [{name: ocrd-dummy, deploy_type: kubernetes}]
"#,
                expected_path: "$.hosts[0].workers[0].deploy_type",
            },
            TestCase {
                name: "docker worker without image",
                yaml: r#"
process_queue: {address: localhost, port: 4222, credentials: {username: a, password: b}}
hosts:
  - address: localhost
    workers: [{name: ocrd-dummy, deploy_type: docker}]
"#,
                expected_path: "$.hosts[0].workers[0].image",
            },
            TestCase {
                name: "no workers on host",
                yaml: r#"
process_queue: {address: localhost, port: 4222, credentials: {username: a, password: b}}
hosts:
  - address: localhost
    workers: []
"#,
                expected_path: "$.hosts[0].workers",
            },
            TestCase {
                name: "unknown root field",
                yaml: r#"
process_queue: {address: localhost, port: 4222, credentials: {username: a, password: b}}
hosts: []
mongo_url: mongodb://localhost
"#,
                expected_path: "$.mongo_url",
            },
        ];

        for case in test_cases {
            let paths = error_paths(case.yaml);
            assert!(
                paths.iter().any(|p| p == case.expected_path),
                "case '{}': expected error at {}, got {:?}",
                case.name,
                case.expected_path,
                paths
            );
        }
    }

    #[test]
    fn host_syntax() {
        assert!(is_valid_host("local"));
        assert!(is_valid_host("localhost"));
        assert!(is_valid_host("192.168.1.20"));
        assert!(is_valid_host("::1"));
        assert!(is_valid_host("worker-01.cluster.example.org"));
        assert!(!is_valid_host("-bad.example.org"));
        assert!(!is_valid_host("under_score.example.org"));
        assert!(!is_valid_host("double..dot"));
    }
}
