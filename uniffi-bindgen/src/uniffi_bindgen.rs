//! Generates Swift and Kotlin bindings for the `exposurekit` library.

fn main() {
    uniffi::uniffi_bindgen_main();
}
