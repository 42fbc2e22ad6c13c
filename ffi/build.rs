use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=src");

    let crate_dir = env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string());
    let out_dir = match env::var("OUT_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => return,
    };

    match cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_language(cbindgen::Language::C)
        .with_include_guard("GQL_FFI_H")
        .generate()
    {
        Ok(bindings) => {
            bindings.write_to_file(out_dir.join("gql_ffi.h"));
        }
        Err(e) => println!("cargo:warning=header generation skipped: {e}"),
    }
}
