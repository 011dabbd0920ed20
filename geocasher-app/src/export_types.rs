use std::borrow::Cow;

use geocasher_app_lib::mk_specta;
use specta_typescript::Typescript;

/// Write the TypeScript bindings for every command and event the UI can use
pub fn main() {
    let args = std::env::args().collect::<Vec<_>>();
    let path = args.get(1).expect("Usage: export-types <bindings.ts>");
    let mut lang = Typescript::new();
    lang.header = Cow::Borrowed("/* eslint @typescript-eslint/no-unused-vars: 0 */");
    mk_specta()
        .export(lang, path)
        .expect("Failed to export bindings");
    println!("Exported geocasher bindings to {path}");
}
