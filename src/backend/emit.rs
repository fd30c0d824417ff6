//! Drives code generation for a whole module: one frame layout and one
//! selector pass per function, then the data section for globals.

use indoc::indoc;

use crate::{
    backend::{frame::FrameLayout, selector::InstSelector},
    ir::{module::Module, pretty_print::pretty_print_function},
};

#[derive(Debug, Default, Clone)]
pub struct CodegenOptions {
    /// Interleave each IR instruction as an assembly comment above the
    /// code selected for it.
    pub show_ir: bool,
    /// Dump each function's IR to stdout before selecting code for it.
    pub dump_ir: bool,
}

pub fn emit_module(module: &Module, options: &CodegenOptions) -> String {
    let mut output = String::from(indoc! {"
        .arch armv7-a
        .text
    "});

    for (id, function) in module.functions.enumerate() {
        if options.dump_ir {
            pretty_print_function(module, function);
        }

        let frame = FrameLayout::compute(function);
        let selector = InstSelector::new(function, id, module, &frame, options.show_ir);
        output.push_str(&selector.run());
        output.push('\n');
    }

    if !module.globals.is_empty() {
        output.push_str(".data\n");
        for global in module.globals.iter() {
            let name = global.name.value();
            output.push_str(&format!(".globl {name}\n{name}:\n"));

            if global.ty.is_array() {
                output.push_str(&format!("    .space {}\n", global.ty.size()));
            } else {
                output.push_str(&format!(
                    "    .word {}\n",
                    global.initializer.unwrap_or(0)
                ));
            }
        }
    }

    output
}
