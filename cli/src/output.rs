use colored::Colorize;

pub fn header(title: &str) {
    println!("{}", title.bold().underline());
}

pub fn subheader(title: &str) {
    println!("{}", title.bold());
}

pub fn hint(msg: &str) {
    println!("{} {}", "hint:".cyan().bold(), msg.dimmed());
}

pub fn info(msg: &str) {
    eprintln!("{} {}", "info:".blue().bold(), msg);
}

/// One labelled value, indented under a (sub)header.
pub fn field(label: &str, value: &str) {
    println!("  {} {}", format!("{label}:").dimmed(), value);
}

/// A completion returned by the gateway.
pub fn assistant(text: &str) {
    println!("{} {}", "assistant>".magenta().bold(), text.trim_end());
}
