// Copyright © 2018 Cormac O'Brien
//
// Permission is hereby granted, free of charge, to any person obtaining a copy of this software
// and associated documentation files (the "Software"), to deal in the Software without
// restriction, including without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all copies or
// substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING
// BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
// DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

extern crate docopt;
extern crate env_logger;
extern crate lazybee;
#[macro_use]
extern crate serde_derive;

use std::process::exit;

use lazybee::common::bsp::{MapResource, Severity};

use docopt::Docopt;

#[derive(Deserialize)]
struct Args {
    arg_map: String,
    flag_entities: bool,
    flag_vertices: bool,
    flag_version: bool,
}

const USAGE: &'static str = "
Usage: bsp-info [options] <map>
       bsp-info (-h | --help)
       bsp-info --version

Options:
    -e, --entities  Print the map's entities.
    -x, --vertices  Expand the surface geometry and report the vertex count.

    -h, --help      Show this message and exit.
        --version   Print version information and exit.

Set RUST_LOG=debug to see the lump directory.
";

const VERSION: &'static str = "bsp-info 0.1";

fn main() {
    env_logger::init();

    let args: Args = Docopt::new(USAGE)
        .and_then(|d| d.deserialize())
        .unwrap_or_else(|e| e.exit());

    if args.flag_version {
        println!("{}", VERSION);
        exit(0);
    }

    let mut map = MapResource::open(&args.arg_map);

    let header = *map.header();
    println!(
        "{}: ident {} version {} checksum {:#010x}",
        args.arg_map,
        String::from_utf8_lossy(&header.ident),
        header.version,
        header.checksum
    );
    println!("{}", map.counts());

    let mut errors = 0;
    for diagnostic in map.diagnostics() {
        let level = match diagnostic.severity() {
            Severity::Warning => "warning",
            Severity::Error => {
                errors += 1;
                "error"
            }
        };
        println!("{}: {}", level, diagnostic);
    }

    if args.flag_entities {
        match map.entities() {
            Ok(ents) => {
                for (i, ent) in ents.iter().enumerate() {
                    let mut keys: Vec<_> = ent.keys().collect();
                    keys.sort();

                    println!("entity {}:", i);
                    for key in keys {
                        println!("    {} = {}", key, ent[key]);
                    }
                }
            }
            Err(why) => println!("error: {}", why),
        }
    }

    let mut status = if errors > 0 { 1 } else { 0 };

    if args.flag_vertices {
        match map.expand_vertices() {
            Ok(buffer) => println!(
                "{} render vertices ({} bytes)",
                buffer.len(),
                buffer.as_bytes().len()
            ),
            Err(why) => {
                println!("error: {}", why);
                status = 1;
            }
        }
    }

    map.close();
    exit(status);
}
