use crate::e2e::*;

#[test]
fn empty_file() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("drakefile", "")?;
    let out = space.run(&mut drake_command(vec![]))?;
    assert!(!out.status.success());
    assert_output_contains(&out, "drake: error: no path specified and no default");
    Ok(())
}

#[test]
fn basic_build() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("drakefile", &format!("build out: in\n{}", COPY))?;
    space.write("in", "hello")?;
    let out = space.run_expect(&mut drake_command(vec!["out"]))?;
    assert_output_contains(&out, "copy out");
    assert_output_contains(&out, "ran 1 task, now up to date");
    assert_eq!(space.read("out")?, b"hello");

    let out = space.run_expect(&mut drake_command(vec!["out"]))?;
    assert_output_contains(&out, "no work to do");
    Ok(())
}

#[test]
fn rebuild_on_content_not_timestamp() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("drakefile", &format!("build out: in\n{}", COPY))?;
    space.write("in", "one")?;
    space.run_expect(&mut drake_command(vec!["out"]))?;

    // Rewriting identical content with a new timestamp changes nothing.
    space.write("in", "one")?;
    filetime::set_file_mtime(
        space.path("in"),
        filetime::FileTime::from_unix_time(2_000_000_000, 0),
    )?;
    let out = space.run_expect(&mut drake_command(vec!["out"]))?;
    assert_output_contains(&out, "no work to do");

    space.write("in", "two")?;
    let out = space.run_expect(&mut drake_command(vec!["out"]))?;
    assert_output_contains(&out, "ran 1 task");
    assert_eq!(space.read("out")?, b"two");
    Ok(())
}

#[test]
fn create_subdir() -> anyhow::Result<()> {
    // Run a build rule that needs a subdir to be automatically created.
    let space = TestSpace::new()?;
    space.write("drakefile", &format!("build subdir/out: in\n{}", COPY))?;
    space.write("in", "")?;
    space.run_expect(&mut drake_command(vec!["subdir/out"]))?;
    assert!(space.exists("subdir/out"));
    assert!(space.exists("subdir/.drake/out/drake"));
    Ok(())
}

#[test]
fn default_target() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "drakefile",
        &format!("build a: in\n{}build b: in\n{}default b\n", COPY, COPY),
    )?;
    space.write("in", "")?;
    let out = space.run_expect(&mut drake_command(vec![]))?;
    assert_output_contains(&out, "copy b");
    assert_output_not_contains(&out, "copy a");
    assert!(!space.exists("a"));
    Ok(())
}

#[cfg(unix)]
#[test]
fn chained_builders() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "drakefile",
        "
# The final output comes first; order in the file doesn't matter.
build all: mid in
  command = cat $in > $out
build mid: in
  command = tr a-z A-Z < $in > $out
",
    )?;
    space.write("in", "abc\n")?;
    let out = space.run_expect(&mut drake_command(vec!["all"]))?;
    assert_output_contains(&out, "ran 2 tasks");
    assert_eq!(space.read("all")?, b"ABC\nabc\n");
    Ok(())
}

#[cfg(unix)]
#[test]
fn verbose_prints_command() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("drakefile", "build out: in\n  command = cp $in $out\n  description = copy\n")?;
    space.write("in", "")?;
    let out = space.run_expect(&mut drake_command(vec!["-v", "out"]))?;
    assert_output_contains(&out, "cp in out");
    Ok(())
}

#[cfg(unix)]
#[test]
fn failed_command() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "drakefile",
        "build out: in\n  command = echo oops; exit 1\n  description = fail out\n",
    )?;
    space.write("in", "")?;
    let out = space.run(&mut drake_command(vec!["out"]))?;
    assert!(!out.status.success());
    assert_output_contains(&out, "failed: fail out");
    assert_output_contains(&out, "oops");
    assert_output_contains(&out, "drake: error: fail out failed to build out");
    Ok(())
}

#[cfg(unix)]
#[test]
fn output_not_created() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("drakefile", "build out: in\n  command = true\n  description = lazy\n")?;
    space.write("in", "")?;
    let out = space.run(&mut drake_command(vec!["out"]))?;
    assert!(!out.status.success());
    assert_output_contains(&out, "out wasn't created by lazy");
    Ok(())
}

#[test]
fn missing_input() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("drakefile", &format!("build out: in\n{}", COPY))?;
    let out = space.run(&mut drake_command(vec!["out"]))?;
    assert!(!out.status.success());
    assert_output_contains(&out, "no builder to make in");
    Ok(())
}

#[test]
fn unknown_target() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("drakefile", &format!("build out: in\n{}", COPY))?;
    let out = space.run(&mut drake_command(vec!["nope"]))?;
    assert_output_contains(&out, "unknown path requested: \"nope\"");
    Ok(())
}

#[test]
fn parse_error_points_at_line() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("drakefile", "build a: b\n  command = x\nbuild oops\n")?;
    let out = space.run(&mut drake_command(vec!["a"]))?;
    assert_output_contains(&out, "parse error: expected ':'");
    assert_output_contains(&out, "drakefile:3: build oops");
    Ok(())
}

#[test]
fn chdir_and_file_flags() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("sub/rules.drake", &format!("build out: in\n{}", COPY))?;
    space.write("sub/in", "x")?;
    space.run_expect(&mut drake_command(vec!["-C", "sub", "-f", "rules.drake", "out"]))?;
    assert_eq!(space.read("sub/out")?, b"x");
    Ok(())
}

#[cfg(unix)]
#[test]
fn srctree_flag() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("build/drakefile", &format!("build out: in\n{}", COPY))?;
    space.write("src/in", "from src")?;
    // Sources resolve under the source tree, products under the working
    // directory.
    space.run_expect(&mut drake_command(vec!["-C", "build", "-s", "../src", "out"]))?;
    assert_eq!(space.read("build/out")?, b"from src");
    assert!(!space.exists("src/out"));
    Ok(())
}

#[test]
fn clean_tool() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "drakefile",
        &format!("build mid: in\n{}build out: mid\n{}", COPY, COPY),
    )?;
    space.write("in", "")?;
    space.run_expect(&mut drake_command(vec!["out"]))?;
    assert!(space.exists("mid"));

    let out = space.run_expect(&mut drake_command(vec!["-t", "clean", "out"]))?;
    assert_output_contains(&out, "Deleting out");
    assert_output_contains(&out, "drake: removed 2 files");
    assert!(!space.exists("out"));
    assert!(!space.exists("mid"));
    assert!(space.exists("in"));

    let out = space.run_expect(&mut drake_command(vec!["out"]))?;
    assert_output_contains(&out, "ran 2 tasks");
    Ok(())
}

#[test]
fn sources_tool() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "drakefile",
        &format!("build mid: in\n{}build out: mid\n{}", COPY, COPY),
    )?;
    let out = space.run_expect(&mut drake_command(vec!["-t", "sources", "out"]))?;
    assert_eq!(std::str::from_utf8(&out.stdout)?, "mid\nin\n");
    Ok(())
}

#[test]
fn unknown_tool() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("drakefile", &format!("build out: in\n{}", COPY))?;
    let out = space.run(&mut drake_command(vec!["-t", "frob", "out"]))?;
    assert_output_contains(&out, "unknown -t \"frob\", use -t list to list");
    Ok(())
}

#[test]
fn explain_logs_reasons() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("drakefile", &format!("build out: in\n{}", COPY))?;
    space.write("in", "1")?;
    let out = space.run_expect(&mut drake_command(vec!["-d", "explain", "out"]))?;
    assert_log_contains(&out, "execution needed because of missing target: out");

    space.write("in", "2")?;
    let out = space.run_expect(&mut drake_command(vec!["-d", "explain", "out"]))?;
    assert_log_contains(&out, "execution needed because hash is outdated: in");
    Ok(())
}

#[cfg(unix)]
#[test]
fn include_subdirectory() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "drakefile",
        &format!("include lib\nbuild out: lib/mid\n{}", COPY),
    )?;
    space.write("lib/drakefile", &format!("build mid: in\n{}default mid\n", COPY))?;
    space.write("lib/in", "x")?;

    let out = space.run_expect(&mut drake_command(vec!["out"]))?;
    assert_output_contains(&out, "copy lib/mid");
    assert_output_contains(&out, "ran 2 tasks");
    assert_eq!(space.read("out")?, b"x");
    assert!(space.exists("lib/.drake/mid/drake"));

    // Defaults of included files are prefixed too.
    space.remove("lib/mid")?;
    let out = space.run_expect(&mut drake_command(vec![]))?;
    assert_output_contains(&out, "copy lib/mid");
    assert_output_not_contains(&out, "copy out");
    Ok(())
}

#[test]
fn graph_tool() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "drakefile",
        &format!("build mid: in\n{}build out: mid\n{}", COPY, COPY),
    )?;
    let out = space.run_expect(&mut drake_command(vec!["-t", "graph"]))?;
    assert_output_contains(&out, "digraph\n{\n");
    assert_output_contains(&out, "  node_1 [label=\"in\"]\n");
    assert_output_contains(&out, "  builder_0 [label=\"copy mid\", shape=rect]\n");
    assert_output_contains(&out, "  node_1 -> builder_0\n");
    assert_output_contains(&out, "  builder_0 -> node_0\n");
    assert_output_contains(&out, "  node_0 -> builder_1\n");
    assert_output_contains(&out, "  builder_1 -> node_2\n");

    let out = space.run_expect(&mut drake_command(vec!["-t", "graph", "^in$"]))?;
    assert_output_not_contains(&out, "node_1");
    assert_output_contains(&out, "  builder_0 -> node_0\n");

    let out = space.run(&mut drake_command(vec!["-t", "graph", "("]))?;
    assert!(!out.status.success());
    assert_output_contains(&out, "bad filter \"(\"");
    Ok(())
}
