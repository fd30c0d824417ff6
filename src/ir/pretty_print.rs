use colored::Colorize;
use itertools::Itertools;

use crate::{
    index::Index,
    ir::{
        function::Function,
        instruction::Inst,
        module::Module,
        value::{InstId, Operand},
    },
};

fn format_operand(function: &Function, module: &Module, operand: Operand) -> String {
    match operand {
        Operand::Const(v) => v.to_string().yellow().to_string(),
        Operand::Global(id) => format!("@{}", module.globals[id].name).blue().to_string(),
        Operand::Local(id) => match function.locals[id].name {
            Some(name) => format!("%{name}").green().to_string(),
            None => format!("%l{}", id.index()).green().to_string(),
        },
        Operand::Param(k) => format!("%arg{k}").green().to_string(),
        Operand::Temp(id) => format!("%t{}", id.index()).cyan().to_string(),
        Operand::Reg(reg) => reg.to_string().red().to_string(),
    }
}

fn label_name(id: InstId) -> String {
    format!(".L{}", id.index())
}

/// Renders a single placed instruction. The output is colored; callers
/// embedding it elsewhere (assembly comments) strip the escapes first.
pub fn format_inst(function: &Function, module: &Module, id: InstId) -> String {
    let operand = |op| format_operand(function, module, op);
    let result = format!("%t{}", id.index()).cyan().to_string();

    match &function.insts[id] {
        Inst::Entry => "entry".magenta().to_string(),
        Inst::Exit { value } => match value {
            Some(v) => format!("{} {}", "exit".magenta(), operand(*v)),
            None => "exit".magenta().to_string(),
        },
        Inst::Label => format!("{}:", label_name(id).bright_red()),
        Inst::Jump { target } => {
            format!("{} {}", "br".magenta(), label_name(*target).bright_red())
        }
        Inst::Branch {
            condition,
            positive,
            negative,
        } => format!(
            "{} {}, {}, {}",
            "bc".magenta(),
            operand(*condition),
            label_name(*positive).bright_red(),
            label_name(*negative).bright_red()
        ),
        Inst::Move {
            destination,
            source,
        } => format!("{} = {}", operand(*destination), operand(*source)),
        Inst::Binary { op, lhs, rhs } => format!(
            "{result} = {} {}, {}",
            op.to_string().magenta(),
            operand(*lhs),
            operand(*rhs)
        ),
        Inst::Call { callee, arguments } => format!(
            "{result} = {} {}({})",
            "call".magenta(),
            module.functions[*callee].name.value().blue(),
            arguments.iter().map(|arg| operand(*arg)).join(", ")
        ),
        Inst::Arg { value } => format!("{} {}", "arg".magenta(), operand(*value)),
        Inst::LoadArray { address, offset } => format!(
            "{result} = {} [{} + {}]",
            "load".magenta(),
            operand(*address),
            operand(*offset)
        ),
        Inst::StoreArray {
            address,
            offset,
            value,
        } => format!(
            "{} [{} + {}], {}",
            "store".magenta(),
            operand(*address),
            operand(*offset),
            operand(*value)
        ),
        Inst::ArraySlice { address, ty } => format!(
            "{result} = {} {}, [{}]",
            "slice".magenta(),
            operand(*address),
            ty.dims.iter().join("][")
        ),
    }
}

/// Dumps a function's placed IR to stdout.
pub fn pretty_print_function(module: &Module, function: &Function) {
    println!(
        "{} {}{}{} {{",
        "fn".magenta(),
        function.name.value().blue(),
        "(".white(),
        ")".white()
    );

    for id in &function.code {
        match function.insts[*id] {
            Inst::Label => println!("{}", format_inst(function, module, *id)),
            _ => println!("    {}", format_inst(function, module, *id)),
        }
    }

    println!("{}", "}".white());
}
