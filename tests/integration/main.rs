//! Integration tests for pawgen-publish

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// A scratch project: an output tree plus an isolated config file
    struct Project {
        dir: TempDir,
    }

    impl Project {
        fn new(extra_config: &str) -> Self {
            let dir = TempDir::new().unwrap();
            let config = format!(
                "[general]\naudit_log = false\n\n[output]\ndir = \"public\"\ndigest_storage = \"sidecar\"\n\n{}",
                extra_config
            );
            std::fs::write(dir.path().join("config.toml"), config).unwrap();
            Self { dir }
        }

        fn root(&self) -> &Path {
            self.dir.path()
        }

        fn public(&self) -> PathBuf {
            self.root().join("public")
        }

        fn write(&self, rel: &str, content: &str) {
            let path = self.public().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }

        fn cmd(&self) -> Command {
            let mut cmd = cargo_bin_cmd!("pawgen-publish");
            cmd.current_dir(self.root())
                .arg("--no-local")
                .arg("--config")
                .arg(self.root().join("config.toml"))
                .env_remove("NETLIFY_AUTH_TOKEN")
                .env_remove("CLOUDFLARE_API_TOKEN")
                .env("CI", "true");
            cmd
        }
    }

    fn site(extra_config: &str) -> Project {
        let project = Project::new(extra_config);
        project.write("index.html", "<h1>home</h1>");
        project.write("about/index.html", "<h1>about</h1>");
        project.write("assets/site.css", "body { color: black }");
        project
    }

    #[test]
    fn help_displays() {
        cargo_bin_cmd!("pawgen-publish")
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Digest, verify and deploy"));
    }

    #[test]
    fn version_displays() {
        cargo_bin_cmd!("pawgen-publish")
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("pawgen-publish"));
    }

    #[test]
    fn config_path_uses_override() {
        let project = Project::new("");
        project
            .cmd()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show_masks_tokens() {
        let project = Project::new("[netlify]\ntoken = \"secret-token\"\n");
        project
            .cmd()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[deploy]"))
            .stdout(predicate::str::contains("secret-token").not());
    }

    #[test]
    fn config_set_writes_file() {
        let project = Project::new("");
        project
            .cmd()
            .args(["config", "set", "netlify.site_id", "my-blog"])
            .assert()
            .success();

        let content = std::fs::read_to_string(project.root().join("config.toml")).unwrap();
        assert!(content.contains("site_id = \"my-blog\""));
        assert!(content.contains("digest_storage = \"sidecar\""));
    }

    #[test]
    fn config_set_rejects_unknown_key() {
        let project = Project::new("");
        project
            .cmd()
            .args(["config", "set", "vm.name", "x"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown config key"));
    }

    #[test]
    fn digest_then_verify() {
        let project = site("");
        project.cmd().args(["digest", "public"]).assert().success();
        assert!(project.public().join(".index.html.digests").exists());

        project
            .cmd()
            .arg("verify")
            .assert()
            .success()
            .stdout(predicate::str::contains("3 files match"));
    }

    #[test]
    fn verify_detects_modified_file() {
        let project = site("");
        project.cmd().args(["digest", "public"]).assert().success();
        project.write("about/index.html", "<h1>tampered</h1>");

        project
            .cmd()
            .arg("verify")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Checksum verification failed for 1 file"));
    }

    #[test]
    fn verify_without_digests_fails() {
        let project = site("");
        project
            .cmd()
            .arg("verify")
            .assert()
            .failure()
            .stderr(predicate::str::contains("No sha1 digest recorded"));
    }

    #[test]
    fn missing_output_dir_fails() {
        let project = Project::new("");
        project
            .cmd()
            .args(["verify", "nowhere"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Path not found"));
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let project = site("");
        project.cmd().args(["digest", "public"]).assert().success();
        project
            .cmd()
            .args(["deploy", "-p", "github"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown deploy provider 'github'"));
    }

    #[test]
    fn provider_none_only_verifies() {
        let project = site("");
        project.cmd().args(["digest", "public"]).assert().success();
        project
            .cmd()
            .args(["deploy", "-p", "none"])
            .assert()
            .success()
            .stdout(predicate::str::contains("no deploy providers selected"));
    }

    #[test]
    fn deploy_refuses_modified_output() {
        let project = site("");
        project.cmd().args(["digest", "public"]).assert().success();
        project.write("index.html", "<h1>changed</h1>");
        project
            .cmd()
            .args(["deploy", "-p", "none"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Checksum verification failed"));
    }

    #[test]
    fn netlify_without_token_fails_before_upload() {
        let project = site("[netlify]\nsite_id = \"blog\"\n");
        project
            .cmd()
            .args(["deploy", "-p", "netlify"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Missing token for netlify"));
    }

    #[test]
    fn netlify_deploy_end_to_end() {
        use httpmock::Method::{GET, POST};
        use httpmock::MockServer;

        let server = MockServer::start();
        let project = site(&format!(
            "[netlify]\nbase_url = \"{}\"\ntoken = \"tok\"\nsite_id = \"blog\"\npoll_interval_secs = 0\n",
            server.base_url()
        ));
        project.cmd().args(["digest", "public"]).assert().success();

        let lookup = server.mock(|when, then| {
            when.method(GET).path("/sites/blog/deploys");
            then.status(200).body("[]");
        });
        let create = server.mock(|when, then| {
            when.method(POST)
                .path("/sites/blog/deploys")
                .header("authorization", "Bearer tok")
                .body_contains("/about/index.html")
                .body_contains("/assets/site.css");
            then.status(200).body(r#"{"id":"d1","state":"new"}"#);
        });
        let poll = server.mock(|when, then| {
            when.method(GET).path("/deploys/d1");
            then.status(200).body(
                r#"{"id":"d1","state":"ready","required":[],"ssl_url":"https://blog.netlify.app"}"#,
            );
        });

        project
            .cmd()
            .args(["deploy", "-p", "netlify", "--yes"])
            .assert()
            .success()
            .stdout(predicate::str::contains("https://blog.netlify.app"))
            .stdout(predicate::str::contains("0 uploaded, 3 unchanged"));

        lookup.assert();
        create.assert();
        poll.assert();
    }

    #[test]
    fn failed_provider_exits_nonzero() {
        use httpmock::Method::GET;
        use httpmock::MockServer;

        let server = MockServer::start();
        let project = site(&format!(
            "[deploy]\nmax_attempts = 1\n\n[netlify]\nbase_url = \"{}\"\ntoken = \"bad\"\nsite_id = \"blog\"\n",
            server.base_url()
        ));
        project.cmd().args(["digest", "public"]).assert().success();

        server.mock(|when, then| {
            when.method(GET).path("/sites/blog/deploys");
            then.status(401)
                .body(r#"{"code":401,"message":"Access Denied"}"#);
        });

        project
            .cmd()
            .args(["deploy", "-p", "netlify", "--yes"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Deployment failed for: netlify"));
    }
}
