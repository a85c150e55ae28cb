//! Dynamic dependencies found by include scanning.

use crate::e2e::*;

#[cfg(unix)]
const SCAN_BUILD: &str = "
build main.o: main.c
  command = cat $in > $out
  description = compile $out
  scan = includes
";

#[cfg(unix)]
#[test]
fn header_change_rebuilds() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("drakefile", SCAN_BUILD)?;
    space.write("main.c", "#include \"main.h\"\nint main;\n")?;
    space.write("main.h", "int x;\n")?;

    let out = space.run_expect(&mut drake_command(vec!["main.o"]))?;
    assert_output_contains(&out, "ran 1 task");
    let ledger = String::from_utf8(space.read(".drake/main.o/includes")?)?;
    assert!(ledger.ends_with(" main.h\n"), "{:?}", ledger);

    let out = space.run_expect(&mut drake_command(vec!["main.o"]))?;
    assert_output_contains(&out, "no work to do");

    space.write("main.h", "int y;\n")?;
    let out = space.run_expect(&mut drake_command(vec!["main.o"]))?;
    assert_output_contains(&out, "ran 1 task");
    Ok(())
}

#[cfg(unix)]
#[test]
fn transitive_headers() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("drakefile", SCAN_BUILD)?;
    space.write("main.c", "#include \"inc/a.h\"\n#include <stdio.h>\n")?;
    space.write("inc/a.h", "#include \"b.h\"\n#include \"nowhere.h\"\n")?;
    space.write("inc/b.h", "1\n")?;

    space.run_expect(&mut drake_command(vec!["main.o"]))?;
    let ledger = String::from_utf8(space.read(".drake/main.o/includes")?)?;
    let members: Vec<&str> = ledger
        .lines()
        .filter_map(|line| line.split_once(' ').map(|(_, identity)| identity))
        .collect();
    assert_eq!(members, vec!["inc/a.h", "inc/b.h"]);

    // A header included only indirectly still triggers a rebuild.
    space.write("inc/b.h", "2\n")?;
    let out = space.run_expect(&mut drake_command(vec!["main.o"]))?;
    assert_output_contains(&out, "ran 1 task");
    Ok(())
}

#[cfg(unix)]
#[test]
fn dropped_include_is_forgotten() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("drakefile", SCAN_BUILD)?;
    space.write("main.c", "#include \"main.h\"\n")?;
    space.write("main.h", "1\n")?;
    space.run_expect(&mut drake_command(vec!["main.o"]))?;

    space.write("main.c", "int main;\n")?;
    space.run_expect(&mut drake_command(vec!["main.o"]))?;
    // The set is no longer declared, so its ledger is gone.
    assert!(!space.exists(".drake/main.o/includes"));

    space.write("main.h", "2\n")?;
    let out = space.run_expect(&mut drake_command(vec!["main.o"]))?;
    assert_output_contains(&out, "no work to do");
    Ok(())
}

#[cfg(unix)]
#[test]
fn deleted_header_needs_clean() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("drakefile", SCAN_BUILD)?;
    space.write("main.c", "#include \"main.h\"\n")?;
    space.write("main.h", "1\n")?;
    space.run_expect(&mut drake_command(vec!["main.o"]))?;

    space.write("main.c", "int main;\n")?;
    space.remove("main.h")?;
    let out = space.run(&mut drake_command(vec!["main.o"]))?;
    assert!(!out.status.success());
    assert_output_contains(&out, "no builder to make main.h");

    space.run_expect(&mut drake_command(vec!["-t", "clean", "main.o"]))?;
    let out = space.run_expect(&mut drake_command(vec!["main.o"]))?;
    assert_output_contains(&out, "ran 1 task");
    Ok(())
}

#[cfg(unix)]
#[test]
fn generated_header() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "drakefile",
        &[
            SCAN_BUILD,
            "build gen.h: gen.txt
  command = cat $in > $out
  description = generate $out
",
        ]
        .join(""),
    )?;
    space.write("main.c", "#include \"gen.h\"\n")?;
    space.write("gen.txt", "1\n")?;

    // gen.h doesn't exist yet but is produced, so it's scanned for and built
    // before compiling.
    let out = space.run_expect(&mut drake_command(vec!["main.o"]))?;
    assert_output_contains(&out, "generate gen.h");
    assert_output_contains(&out, "ran 2 tasks");

    space.write("gen.txt", "2\n")?;
    let out = space.run_expect(&mut drake_command(vec!["main.o"]))?;
    assert_output_contains(&out, "ran 2 tasks");
    Ok(())
}

#[cfg(unix)]
#[test]
fn header_included_by_generated_header() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write(
        "drakefile",
        &[
            SCAN_BUILD,
            "build gen.h: gen.txt
  command = cat $in > $out
  description = generate $out
",
        ]
        .join(""),
    )?;
    space.write("main.c", "#include \"gen.h\"\n")?;
    space.write("gen.txt", "#include \"extra.h\"\n")?;
    space.write("extra.h", "1\n")?;

    let out = space.run_expect(&mut drake_command(vec!["main.o"]))?;
    assert_output_contains(&out, "ran 2 tasks");
    let ledger = String::from_utf8(space.read(".drake/main.o/includes")?)?;
    assert!(ledger.contains(" extra.h\n"), "{:?}", ledger);

    let out = space.run_expect(&mut drake_command(vec!["main.o"]))?;
    assert_output_contains(&out, "no work to do");

    // Only reachable through the generated header, yet still tracked.
    space.write("extra.h", "2\n")?;
    let out = space.run_expect(&mut drake_command(vec!["main.o"]))?;
    assert_output_contains(&out, "compile main.o");
    assert_output_contains(&out, "ran 1 task");
    Ok(())
}
