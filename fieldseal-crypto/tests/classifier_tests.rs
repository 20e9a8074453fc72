use fieldseal_crypto::{
    RecordFields, encrypt_record_fields, generate_workspace_key, looks_like_ciphertext,
};

#[test]
fn real_ciphertext_is_recognized() {
    let key = generate_workspace_key();
    let encrypted = encrypt_record_fields(
        &RecordFields {
            title: "Test Event".into(),
            description: "Description".into(),
            location: None,
        },
        &key,
    )
    .unwrap();

    assert!(looks_like_ciphertext(Some(&encrypted.title)));
    assert!(looks_like_ciphertext(Some(&encrypted.description)));
}

#[test]
fn empty_string_is_a_valid_encrypted_state() {
    assert!(looks_like_ciphertext(Some("")));
}

#[test]
fn plaintext_with_spaces_is_rejected() {
    assert!(!looks_like_ciphertext(Some("Team Meeting")));
    assert!(!looks_like_ciphertext(Some("This is a description")));
}

#[test]
fn short_strings_are_rejected() {
    assert!(!looks_like_ciphertext(Some("abc")));
    assert!(!looks_like_ciphertext(Some("short")));
}

#[test]
fn absent_value_is_rejected() {
    assert!(!looks_like_ciphertext(None));
}

#[test]
fn invalid_base64_characters_are_rejected() {
    assert!(!looks_like_ciphertext(Some("Hello World!")));
    assert!(!looks_like_ciphertext(Some("test@example.com")));
    let long_with_dash = format!("{}-", "A".repeat(50));
    assert!(!looks_like_ciphertext(Some(&long_with_dash)));
}

#[test]
fn long_base64_only_strings_are_accepted() {
    assert!(looks_like_ciphertext(Some(&"abcdEFGH0123+/==".repeat(3))));
}
