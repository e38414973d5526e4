// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::{Utf8Path, Utf8PathBuf};
use camino_tempfile::Utf8TempDir;
use color_eyre::eyre::Result;
use jvm_runner::config::JvmTestConfig;
use std::{fs, os::unix::fs::PermissionsExt, sync::Once};

pub(crate) const LAUNCHER_JAR: &str = "lib/junit-platform-console-standalone-1.10.0.jar";

/// Stands in for `java`. It recognizes the JUnit console launcher and the JaCoCo CLI by their
/// jars, and a couple of main classes. Like a real JVM with the JaCoCo agent, it writes a coverage
/// snapshot on exit.
const FAKE_JAVA: &str = r#"#!/bin/sh
dest=""
reports=""
mode=""
prev=""
for arg in "$@"; do
  case "$arg" in
    -javaagent:*) dest=$(printf '%s\n' "$arg" | sed -n 's/.*destfile=\([^,]*\).*/\1/p') ;;
    --reports-dir=*) reports="${arg#--reports-dir=}" ;;
    myorg.Echo) mode=echo ;;
    myorg.Sleeper) mode=sleep ;;
  esac
  if [ "$prev" = "-jar" ]; then
    case "$arg" in
      *junit-platform-console-standalone*) mode=junit ;;
      *jacococli*) mode=jacoco ;;
    esac
  fi
  prev="$arg"
done

status=0
case "$mode" in
  echo)
    printf '%s\n' "$@"
    echo "stderr from echo" >&2
    status="${FAKE_JAVA_EXIT:-0}"
    ;;
  sleep)
    sleep 30
    ;;
  junit)
    cat > "$reports/TEST-junit-jupiter.xml" <<'XML'
<?xml version="1.0" encoding="UTF-8"?>
<testsuite name="JUnit Jupiter" tests="2" skipped="0" failures="1" errors="0" time="1.7" timestamp="2024-01-15T10:30:00">
  <testcase name="passes()" classname="myorg.MyTests" time="0.5"/>
  <testcase name="fails()" classname="myorg.MyTests" time="1.2">
    <failure message="expected: &lt;1&gt; but was: &lt;2&gt;" type="org.opentest4j.AssertionFailedError">org.opentest4j.AssertionFailedError: expected: &lt;1&gt; but was: &lt;2&gt;
	at myorg.MyTests.fails(MyTests.java:12)</failure>
  </testcase>
</testsuite>
XML
    status=1
    ;;
  jacoco)
    prev=""
    for arg in "$@"; do
      case "$prev" in
        --destfile|--xml|--csv) printf 'data\n' > "$arg" ;;
        --html) mkdir -p "$arg" && printf '<html></html>\n' > "$arg/index.html" ;;
      esac
      prev="$arg"
    done
    ;;
  *)
    echo "fake java: unknown launch" >&2
    status=2
    ;;
esac

if [ -n "$dest" ]; then
  printf 'snapshot\n' > "$dest"
fi
exit "$status"
"#;

pub(crate) fn test_init() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        // Not every test needs it, and a second install would fail.
        let _ = color_eyre::install();
    });
}

/// A workspace with a fake JDK, a JUnit console launcher jar and JaCoCo jars.
pub(crate) struct TempWorkspace {
    dir: Utf8TempDir,
}

impl TempWorkspace {
    pub(crate) fn new(coverage: bool) -> Result<Self> {
        let dir = Utf8TempDir::with_prefix("jvmtest-")?;
        let root = dir.path();

        let java = root.join("jdk/bin/java");
        fs::create_dir_all(java.parent().expect("java has a parent"))?;
        fs::write(&java, FAKE_JAVA)?;
        fs::set_permissions(&java, fs::Permissions::from_mode(0o755))?;

        for jar in [
            LAUNCHER_JAR,
            "lib/jacoco/jacocoagent.jar",
            "lib/jacoco/jacococli-0.8.11.jar",
        ] {
            touch(&root.join(jar))?;
        }
        fs::create_dir_all(root.join("classes/myorg"))?;

        let config_file = root.join(JvmTestConfig::CONFIG_PATH);
        fs::create_dir_all(config_file.parent().expect("config file has a parent"))?;
        fs::write(
            &config_file,
            format!(
                r#"
[java]
java-home = '{root}/jdk'
timeout = "20s"

[junit]
classpath = ["{LAUNCHER_JAR}"]

[coverage]
enabled = {coverage}
classpath = ["lib/jacoco/*.jar"]
dest-dir = "coverage"
report-dir = "coverage-report"
class-dirs = ["classes"]
"#
            ),
        )?;

        Ok(Self { dir })
    }

    pub(crate) fn root(&self) -> &Utf8Path {
        self.dir.path()
    }

    pub(crate) fn config(&self) -> Result<JvmTestConfig> {
        Ok(JvmTestConfig::from_sources(None, self.root())?)
    }

    pub(crate) fn output_dir(&self, name: &str) -> Utf8PathBuf {
        self.root().join("output").join(name)
    }
}

fn touch(path: &Utf8Path) -> Result<()> {
    fs::create_dir_all(path.parent().expect("path has a parent"))?;
    fs::write(path, b"")?;
    Ok(())
}
