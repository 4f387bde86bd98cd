use std::fs;
use std::process::{Command, Output};

use tempfile::TempDir;

fn quadscroll(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_quadscroll"))
        .env_remove("QUADSCROLL_SCENE")
        .env_remove("QUADSCROLL_IMAGE")
        .env_remove("QUADSCROLL_CONFIG")
        .env("RUST_LOG", "error")
        .args(args)
        .output()
        .expect("failed to run quadscroll")
}

#[test]
fn check_accepts_builtin_scenes() {
    let output = quadscroll(&["--check"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("colored-quad"));

    let output = quadscroll(&["--check", "--scene", "scrolling-texture"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("scrolling-texture"));
}

#[test]
fn check_reports_broken_fragment_shader() {
    let dir = TempDir::new().unwrap();
    let shader = dir.path().join("broken.frag");
    fs::write(
        &shader,
        "#version 450\nlayout(location = 0) out vec4 outColor;\nvoid main() {\n    outColor = vec4(1.0);\n",
    )
    .unwrap();

    let output = quadscroll(&["--check", "--fragment", shader.to_str().unwrap()]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("fragment shader failed to compile"),
        "unexpected stderr: {stderr}"
    );
}

#[test]
fn check_reports_unresolved_varying() {
    let dir = TempDir::new().unwrap();
    let shader = dir.path().join("mismatch.frag");
    fs::write(
        &shader,
        "#version 450\nlayout(location = 5) in vec3 v_other;\nlayout(location = 0) out vec4 outColor;\nvoid main() {\n    outColor = vec4(v_other, 1.0);\n}\n",
    )
    .unwrap();

    let output = quadscroll(&["--check", "--fragment", shader.to_str().unwrap()]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("failed to link"),
        "unexpected stderr: {stderr}"
    );
}

#[test]
fn check_uses_shaders_named_in_scene_file() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("flat.frag"),
        "#version 450\nlayout(location = 0) in vec4 v_color;\nlayout(location = 0) out vec4 outColor;\nvoid main() {\n    outColor = vec4(v_color.rgb * 0.5, 1.0);\n}\n",
    )
    .unwrap();
    let config = dir.path().join("scene.toml");
    fs::write(
        &config,
        "scene = \"colored-quad\"\nfragment_shader = \"flat.frag\"\nclear_color = [0, 0, 0, 255]\n",
    )
    .unwrap();

    let output = quadscroll(&["--check", "--config", config.to_str().unwrap()]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn invalid_scene_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("scene.toml");
    fs::write(&config, "time_scale = -2.0\n").unwrap();

    let output = quadscroll(&["--check", "--config", config.to_str().unwrap()]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("time_scale"),
        "unexpected stderr: {stderr}"
    );
}

#[test]
fn image_flag_completes_texture_scene_file() {
    let dir = TempDir::new().unwrap();
    let image = dir.path().join("leaves.png");
    image::RgbaImage::from_pixel(2, 2, image::Rgba([40, 160, 40, 255]))
        .save(&image)
        .unwrap();
    let config = dir.path().join("scene.toml");
    fs::write(&config, "scene = \"scrolling-texture\"\ntime_scale = 0.001\n").unwrap();

    let output = quadscroll(&[
        "--check",
        "--config",
        config.to_str().unwrap(),
        "--image",
        image.to_str().unwrap(),
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains("scrolling-texture"));

    let output = quadscroll(&["--check", "--config", config.to_str().unwrap()]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}
