fn main() {
    slint_build::compile("ui/updater.slint").expect("Slint build failed");
}
