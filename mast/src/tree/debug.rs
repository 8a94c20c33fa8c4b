use std::fmt;

use colored::Colorize;

use super::{Link, Node};

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fn traverse(
            f: &mut fmt::Formatter,
            cursor: &Node,
            depth: u8,
            left: bool,
        ) -> fmt::Result {
            if let Some(Link::Loaded { tree }) | Some(Link::Modified { tree }) =
                cursor.link(true)
            {
                traverse(f, tree, depth + 1, true)?;
            }

            let depth_spaces = "    ".repeat(depth as usize);
            let side = if depth == 0 {
                "◆"
            } else if left {
                "┌"
            } else {
                "└"
            };
            let key = String::from_utf8(cursor.key().to_vec())
                .unwrap_or_else(|_| hex::encode(cursor.key()));
            let hash_prefix = hex::encode(&cursor.hash()[..3]);
            writeln!(
                f,
                "{}{} {}: {} (h{})",
                depth_spaces,
                side.blue(),
                key.bold(),
                hash_prefix.dimmed(),
                cursor.height()
            )?;

            if let Some(Link::Loaded { tree }) | Some(Link::Modified { tree }) =
                cursor.link(false)
            {
                traverse(f, tree, depth + 1, false)?;
            }

            Ok(())
        }

        traverse(f, self, 0, false)
    }
}
