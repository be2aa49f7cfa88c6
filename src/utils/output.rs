const BANNER_WIDTH: usize = 80;

pub fn banner(title: &str) {
    println!();
    println!("{}", "=".repeat(BANNER_WIDTH));
    println!("{}", title);
    println!("{}", "=".repeat(BANNER_WIDTH));
}

pub fn section(title: &str) {
    println!();
    println!("{}", title);
}

pub fn item(text: &str) {
    println!("- {}", text);
}
