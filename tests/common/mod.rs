//! Common test utilities for gantry integration tests.
//!
//! `TestEnv` builds an isolated deployment world in a temp directory: a bare
//! repository, a source clone to commit and push from, a working tree, a
//! destination root standing in for `/etc/nginx`, and `/bin/sh` stub scripts
//! standing in for the proxy's validate and reload commands. The stubs drop
//! marker files so tests can assert exactly which external commands ran.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

pub struct TestEnv {
    pub root: TempDir,
    pub repo: PathBuf,
    pub src: PathBuf,
    pub work_tree: PathBuf,
    pub dest: PathBuf,
    pub config_path: PathBuf,
    pub stub_dir: PathBuf,
}

impl TestEnv {
    /// Build a fresh environment with passing validate/reload stubs
    pub fn new() -> Self {
        let root = TempDir::new().expect("create temp root");
        let repo = root.path().join("repo.git");
        let src = root.path().join("src");
        let work_tree = root.path().join("deploy");
        let dest = root.path().join("etc/nginx");
        let config_path = root.path().join("gantry.toml");
        let stub_dir = root.path().join("stubs");

        std::fs::create_dir_all(&src).expect("create src");
        std::fs::create_dir_all(&stub_dir).expect("create stubs");

        git(&src, &["init", "-q"]);
        git(&src, &["config", "user.email", "test@example.com"]);
        git(&src, &["config", "user.name", "Test"]);

        let env = Self {
            root,
            repo,
            src,
            work_tree,
            dest,
            config_path,
            stub_dir,
        };

        env.write_stub(
            "validate.sh",
            &format!(
                "touch \"{root}/validated.marker\"\n\
                 printf '%s\\n' \"$1\" > \"{root}/validated.args\"\n\
                 cat \"{dest}/nginx.conf\" > \"{root}/dest-at-validate.txt\" 2>/dev/null \
                 || echo ABSENT > \"{root}/dest-at-validate.txt\"\n\
                 exit 0",
                root = env.root_path().display(),
                dest = env.dest.display(),
            ),
        );
        env.write_stub(
            "fail-validate.sh",
            &format!(
                "touch \"{root}/validated.marker\"\n\
                 echo 'nginx: [emerg] unknown directive \"bogus\"' >&2\n\
                 exit 1",
                root = env.root_path().display(),
            ),
        );
        env.write_stub(
            "reload.sh",
            &format!(
                "touch \"{root}/reloaded.marker\"\nexit 0",
                root = env.root_path().display(),
            ),
        );

        env.write_config(&env.stub_path("validate.sh"), &env.stub_path("reload.sh"));
        env
    }

    pub fn root_path(&self) -> &Path {
        self.root.path()
    }

    /// Point the validate command at the failing stub
    pub fn use_failing_validator(&self) {
        self.write_config(&self.stub_path("fail-validate.sh"), &self.stub_path("reload.sh"));
    }

    pub fn stub_path(&self, name: &str) -> String {
        self.stub_dir.join(name).display().to_string()
    }

    pub fn write_stub(&self, name: &str, body: &str) {
        let path = self.stub_dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write stub");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
                .expect("chmod stub");
        }
    }

    pub fn write_config(&self, validate_cmd: &str, reload_cmd: &str) {
        let content = format!(
            r#"project = "testsite"

[paths]
repo = "{repo}"
work_tree = "{work_tree}"

[deploy]
ref = "refs/heads/main"

[commands]
validate = "{validate_cmd} {{conf}}"
reload = "{reload_cmd}"

[[sync]]
source = "nginx_conf/nginx.conf"
dest = "{dest}/nginx.conf"
kind = "file"

[[sync]]
source = "nginx_conf/conf.d"
dest = "{dest}/conf.d"
kind = "dir"

[[sync]]
source = "nginx_conf/sites"
dest = "{dest}/sites"
kind = "dir"
"#,
            repo = self.repo.display(),
            work_tree = self.work_tree.display(),
            dest = self.dest.display(),
        );
        std::fs::write(&self.config_path, content).expect("write config");
    }

    /// Write files into the source clone and commit them
    pub fn commit(&self, files: &[(&str, &str)], message: &str) {
        for (rel, content) in files {
            let path = self.src.join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).expect("create source dirs");
            std::fs::write(&path, content).expect("write source file");
        }
        git(&self.src, &["add", "-A"]);
        git(&self.src, &["commit", "-q", "-m", message]);
    }

    /// Commit a file as executable (for certificate scripts)
    pub fn commit_executable(&self, rel: &str, content: &str, message: &str) {
        let path = self.src.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).expect("create source dirs");
        std::fs::write(&path, content).expect("write source file");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
                .expect("chmod source file");
        }
        git(&self.src, &["add", "-A"]);
        git(&self.src, &["commit", "-q", "-m", message]);
    }

    /// Remove a file from the source clone and commit the deletion
    pub fn remove_and_commit(&self, rel: &str, message: &str) {
        git(&self.src, &["rm", "-q", rel]);
        git(&self.src, &["commit", "-q", "-m", message]);
    }

    /// Push the source clone's HEAD to the bare repo's main branch
    ///
    /// `GANTRY_CONFIG` is set so an installed hook resolves this
    /// environment's config.
    pub fn push(&self) -> Output {
        Command::new("git")
            .arg("-C")
            .arg(&self.src)
            .args(["push", "-q", self.repo.to_str().unwrap(), "HEAD:refs/heads/main"])
            .env("GANTRY_CONFIG", &self.config_path)
            .output()
            .expect("git push")
    }

    /// Ensure the bare repository exists (without installing the hook)
    pub fn init_bare(&self) {
        std::fs::create_dir_all(&self.repo).expect("create repo dir");
        let status = Command::new("git")
            .args(["init", "-q", "--bare"])
            .arg(&self.repo)
            .stdout(Stdio::null())
            .status()
            .expect("git init --bare");
        assert!(status.success());
    }

    /// Run the gantry binary with this environment's config
    pub fn gantry(&self, args: &[&str]) -> Output {
        self.gantry_with_stdin(args, "")
    }

    /// Run the gantry binary, feeding `input` on stdin
    pub fn gantry_with_stdin(&self, args: &[&str], input: &str) -> Output {
        use std::io::Write;

        let mut child = Command::new(env!("CARGO_BIN_EXE_gantry"))
            .arg("--config")
            .arg(&self.config_path)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("spawn gantry");

        child
            .stdin
            .take()
            .expect("stdin handle")
            .write_all(input.as_bytes())
            .expect("write stdin");

        child.wait_with_output().expect("wait for gantry")
    }

    pub fn marker_exists(&self, name: &str) -> bool {
        self.root_path().join(name).exists()
    }

    pub fn clear_marker(&self, name: &str) {
        let _ = std::fs::remove_file(self.root_path().join(name));
    }

    pub fn dest_file(&self, rel: &str) -> PathBuf {
        self.dest.join(rel)
    }
}

pub fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .unwrap_or_else(|e| panic!("failed to run git {args:?}: {e}"));
    assert!(status.success(), "git {args:?} failed in {}", dir.display());
}

pub fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
