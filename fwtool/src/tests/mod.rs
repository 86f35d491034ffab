use {
    self::input::{create_file, fingerprint_hex, image},
    crate::ExitCode,
    consts::{APP_LEN, CHUNK_LEN, OP_LEN},
    host_protocol::COMMAND_SIZE,
};

mod input;

/// Print the fingerprint of an image shorter than the application partition.
#[test]
fn fingerprint_pads_image() {
    let image = image(10_000);
    let file = create_file(&image);
    let output = test(["fingerprint", "-i", file.path().to_str().unwrap()]);

    assert_eq!(output.exit_code, ExitCode(0));
    assert!(output.stdout.contains(&fingerprint_hex(&image)));
    assert!(output.stdout.contains("9.77 KiB (10000)"));
    assert!(output.stderr.is_empty());
}

/// An image that does not fit the application partition is rejected.
#[test]
fn fingerprint_image_too_large() {
    let file = create_file(&image(APP_LEN as usize + 1));
    let output = test(["fingerprint", "-i", file.path().to_str().unwrap()]);

    assert_eq!(output.exit_code, ExitCode(1));
    assert!(output.stdout.is_empty());
    assert!(output.stderr.contains("exceeds the 225280 byte application partition"));
}

/// Sign, pack and replay an image against a device holding the signing key.
#[test]
fn sign_pack_simulate() {
    let image = image(3 * CHUNK_LEN as usize + 100);
    let input_file = create_file(&image);
    let secret_pem = create_file(input::SECRET_1_PEM);
    let signature_file = tempfile::NamedTempFile::new().unwrap();
    let frames_file = tempfile::NamedTempFile::new().unwrap();

    let output = test([
        "sign",
        "--pubkey",
        input::PUBKEY_1_HEX,
        "--secret",
        secret_pem.path().to_str().unwrap(),
        "-i",
        input_file.path().to_str().unwrap(),
        "-o",
        signature_file.path().to_str().unwrap(),
    ]);
    assert_eq!(output.exit_code, ExitCode(0));
    assert!(output.stdout.is_empty());
    assert!(output.stderr.is_empty());
    let signature = std::fs::read_to_string(signature_file.path()).unwrap();
    assert_eq!(signature.len(), 128);

    let output = test([
        "pack",
        "-i",
        input_file.path().to_str().unwrap(),
        "-s",
        signature_file.path().to_str().unwrap(),
        "-o",
        frames_file.path().to_str().unwrap(),
    ]);
    assert_eq!(output.exit_code, ExitCode(0));
    assert!(output.stdout.contains(" 6"));

    let output = test([
        "simulate",
        "-f",
        frames_file.path().to_str().unwrap(),
        "--pubkey",
        input::PUBKEY_1_HEX,
    ]);
    assert_eq!(output.exit_code, ExitCode(0));
    assert_eq!(output.stdout.matches("OK").count(), 6);
    assert!(output.stdout.contains(&fingerprint_hex(&image)));
    assert!(output.stdout.contains("0xff"));
    assert!(output.stderr.is_empty());

    // The device key did not sign this image.
    let output = test(["simulate", "-f", frames_file.path().to_str().unwrap()]);
    assert_eq!(output.exit_code, ExitCode(1));
    assert!(output.stdout.contains(&fingerprint_hex(&image)));
    assert!(output.stderr.contains("firmware signature verification failed: ERR"));
}

/// Frame stream layout: erase, one write per chunk, verify.
#[test]
fn pack_frame_layout() {
    let image = image(CHUNK_LEN as usize + 1);
    let input_file = create_file(&image);
    let signature_file = create_file("ab".repeat(64).as_bytes());
    let frames_file = tempfile::NamedTempFile::new().unwrap();

    let output = test([
        "pack",
        "-i",
        input_file.path().to_str().unwrap(),
        "-s",
        signature_file.path().to_str().unwrap(),
        "-o",
        frames_file.path().to_str().unwrap(),
    ]);
    assert_eq!(output.exit_code, ExitCode(0));

    let frames = std::fs::read(frames_file.path()).unwrap();
    assert_eq!(frames.len(), 4 * COMMAND_SIZE);
    let frames: Vec<_> = frames.chunks_exact(COMMAND_SIZE).collect();

    assert_eq!(frames[0][0], b'e');
    assert_eq!((frames[1][0], frames[1][1]), (b'w', 0));
    assert_eq!(&frames[1][OP_LEN..], &image[..CHUNK_LEN as usize]);
    assert_eq!((frames[2][0], frames[2][1]), (b'w', 1));
    // The last chunk is padded with erased bytes.
    assert_eq!(frames[2][OP_LEN], image[CHUNK_LEN as usize]);
    assert!(frames[2][OP_LEN + 1..].iter().all(|&b| b == 0xFF));
    assert_eq!(frames[3][0], b's');
    assert_eq!(&frames[3][OP_LEN..OP_LEN + 128], "ab".repeat(64).as_bytes());
}

/// A signature file that is not 64 bytes of hex is rejected.
#[test]
fn pack_invalid_signature() {
    let input_file = create_file(&image(100));
    let signature_file = create_file(b"abcd");
    let frames_file = tempfile::NamedTempFile::new().unwrap();

    let output = test([
        "pack",
        "-i",
        input_file.path().to_str().unwrap(),
        "-s",
        signature_file.path().to_str().unwrap(),
        "-o",
        frames_file.path().to_str().unwrap(),
    ]);
    assert_eq!(output.exit_code, ExitCode(1));
    assert!(output.stderr.contains("signature file must hold 128 hex characters"));
}

/// Writes without a preceding erase are refused by the device.
#[test]
fn simulate_write_without_erase() {
    let mut frame = vec![0u8; COMMAND_SIZE];
    frame[0] = b'w';
    let mut frames = frame.clone();
    frames.extend_from_slice(&[b's'; 1]);
    frames.resize(2 * COMMAND_SIZE, b'0');
    let frames_file = create_file(&frames);

    let output = test(["simulate", "-f", frames_file.path().to_str().unwrap()]);
    assert_eq!(output.exit_code, ExitCode(1));
    assert!(output.stdout.contains("ERR_LOAD_FLAG"));
    assert!(output.stdout.contains("0xff"));
    assert!(output.stderr.contains("verification failed"));
}

/// A truncated frame stream is rejected before anything is replayed.
#[test]
fn simulate_truncated_frames() {
    let frames_file = create_file(&[b'e'; COMMAND_SIZE + 1]);
    let output = test(["simulate", "-f", frames_file.path().to_str().unwrap()]);

    assert_eq!(output.exit_code, ExitCode(1));
    assert!(output.stdout.is_empty());
    assert!(output.stderr.contains("not a multiple of the 4098 byte command size"));
}

/// Frames without a verify command cannot report a result.
#[test]
fn simulate_no_verify() {
    let mut frames = vec![0u8; COMMAND_SIZE];
    frames[0] = b'v';
    let frames_file = create_file(&frames);
    let output = test(["simulate", "-f", frames_file.path().to_str().unwrap()]);

    assert_eq!(output.exit_code, ExitCode(1));
    assert!(output.stdout.contains("v1.0.0"));
    assert!(output.stderr.contains("frames contain no verify command"));
}

/// Attempt to sign with a key that does not match the expected public key.
#[test]
fn sign_key_mismatch() {
    let input_file = create_file(&image(100));
    let secret_pem = create_file(input::SECRET_1_PEM);
    let signature_file = tempfile::NamedTempFile::new().unwrap();

    let output = test([
        "sign",
        "--pubkey",
        input::PUBKEY_2_HEX,
        "--secret",
        secret_pem.path().to_str().unwrap(),
        "-i",
        input_file.path().to_str().unwrap(),
        "-o",
        signature_file.path().to_str().unwrap(),
    ]);
    assert_eq!(output.exit_code, ExitCode(1));
    assert!(output.stderr.contains("public key does not match secret key"));
    assert!(std::fs::read(signature_file.path()).unwrap().is_empty());
}

/// Sign with the key and pubkey loaded from config.
#[test]
fn sign_with_key_from_config() {
    let input_file = create_file(&image(100));
    let secret_pem = create_file(input::SECRET_1_PEM);
    let signature_file = tempfile::NamedTempFile::new().unwrap();
    let config_file = create_file(
        format!(
            r#"
            pubkey = "{}"
            secret = "{}"
            "#,
            input::PUBKEY_1_HEX,
            secret_pem.path().to_str().unwrap(),
        )
        .as_bytes(),
    );

    let output = test([
        "sign",
        "-i",
        input_file.path().to_str().unwrap(),
        "--config",
        config_file.path().to_str().unwrap(),
        "-o",
        signature_file.path().to_str().unwrap(),
    ]);
    assert_eq!(output.exit_code, ExitCode(0));
    assert!(output.stderr.is_empty());
    assert_eq!(std::fs::read(signature_file.path()).unwrap().len(), 128);
}

/// Attempt to specify the pubkey both in the config file and on the CLI.
#[test]
fn pubkey_in_config_and_cli() {
    let frames_file = create_file(&[]);
    let config_file = create_file(format!(r#"pubkey = "{}""#, input::PUBKEY_1_HEX).as_bytes());

    let output = test([
        "simulate",
        "-f",
        frames_file.path().to_str().unwrap(),
        "--pubkey",
        input::PUBKEY_1_HEX,
        "--config",
        config_file.path().to_str().unwrap(),
    ]);
    assert_eq!(output.exit_code, ExitCode(1));
    assert!(output
        .stderr
        .contains("pubkey specified in both config and cli"));
}

/// Attempt to specify the secret both in the config file and on the CLI.
#[test]
fn secret_in_config_and_cli() {
    let input_file = create_file(&image(100));
    let secret_pem = create_file(input::SECRET_1_PEM);
    let config_file = create_file(format!(r#"secret = "{}""#, secret_pem.path().to_str().unwrap()).as_bytes());

    let output = test([
        "sign",
        "--secret",
        secret_pem.path().to_str().unwrap(),
        "--config",
        config_file.path().to_str().unwrap(),
        "-i",
        input_file.path().to_str().unwrap(),
        "-o",
        "signature.hex",
    ]);
    assert_eq!(output.exit_code, ExitCode(1));
    assert!(output
        .stderr
        .contains("secret specified in both config and cli"));
}

/// Relative secret paths in the config file are ambiguous.
#[test]
fn secret_path_not_absolute_in_config() {
    let input_file = create_file(&image(100));
    let config_file = create_file(br#"secret = "keys/secret.pem""#);

    let output = test([
        "sign",
        "--config",
        config_file.path().to_str().unwrap(),
        "-i",
        input_file.path().to_str().unwrap(),
        "-o",
        "signature.hex",
    ]);
    assert_eq!(output.exit_code, ExitCode(1));
    assert!(output.stderr.contains("secret key path is not absolute"));
}

/// Attempt to sign without a secret key.
#[test]
fn secret_missing() {
    let input_file = create_file(&image(100));
    let output = test([
        "sign",
        "-i",
        input_file.path().to_str().unwrap(),
        "-o",
        "signature.hex",
    ]);
    assert_eq!(output.exit_code, ExitCode(1));
    assert!(output.stderr.contains("user did not specify a secret key"));
}

fn test<const N: usize>(args: [&str; N]) -> Output {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let exit_code = crate::main_args(std::iter::once("fwtool").chain(args), &mut stdout, &mut stderr);
    println!("* args: {:?}", args);
    println!("* exit_code: {:?}", exit_code);
    println!("* stdout:\n{}", String::from_utf8_lossy(&stdout));
    println!("* stderr:\n{}", String::from_utf8_lossy(&stderr));
    Output {
        exit_code,
        stdout: String::from_utf8(stdout).unwrap(),
        stderr: String::from_utf8(stderr).unwrap(),
    }
}

#[derive(Debug)]
struct Output {
    exit_code: ExitCode,
    stdout: String,
    stderr: String,
}
