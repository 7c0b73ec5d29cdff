//! Parses, inspects, builds, serialises and round-trips GBLN values with
//! the linked engine.
//!
//! Run with `--features libgbln`.

use gbln::{Config, ObjectBuilder, Value};

fn describe(value: &Value, depth: usize) {
    let pad = "  ".repeat(depth);
    match value {
        Value::Object(entries) => {
            for (key, child) in entries {
                match child {
                    Value::Object(_) | Value::Array(_) => {
                        println!("{pad}{key}:");
                        describe(child, depth + 1);
                    }
                    scalar => println!("{pad}{key}: {scalar:?}"),
                }
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                println!("{pad}[{i}]");
                describe(item, depth + 1);
            }
        }
        scalar => println!("{pad}{scalar:?}"),
    }
}

fn main() -> gbln::Result<()> {
    let parsed = gbln::parse("user{id<u32>(12345)name<s64>(Alice)age<i8>(25)active<b>(t)}")?;
    println!("=== Parsed ===");
    describe(&parsed, 0);

    let user = &parsed["user"];
    if let (Some(name), Some(age)) = (user["name"].as_str(), user["age"].as_int()) {
        println!("{name} is {age}");
    }

    let built = ObjectBuilder::new()
        .object("config", |c| {
            c.string("host", "localhost")
                .int("port", 8080)
                .bool("tls", false)
                .array("tags", ["api", "internal"])
        })
        .float("version", 1.5)
        .build();

    println!("\n=== Compact ===");
    println!("{}", gbln::to_string(&built)?);
    println!("\n=== Pretty ===");
    println!("{}", gbln::to_string_pretty(&built)?);

    let dir = std::env::temp_dir();
    let io_path = dir.join("basic_usage.io.gbln.xz");
    gbln::write_io(&built, &io_path, &Config::io_default())?;
    let restored = gbln::read_io(&io_path)?;
    println!("\nI/O round trip equal: {}", restored == built);

    let source_path = dir.join("basic_usage.gbln");
    gbln::write_io(&built, &source_path, &Config::source_default())?;
    let reparsed = gbln::parse_file(&source_path)?;
    println!("Source round trip equal: {}", reparsed == built);

    if let Err(e) = gbln::parse("count<u8>(300)") {
        println!("\nExpected failure: {e}");
        if let Some(hint) = e.suggestion() {
            println!("Suggestion: {hint}");
        }
    }

    Ok(())
}
