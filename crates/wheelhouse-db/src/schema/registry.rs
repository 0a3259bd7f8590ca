diesel::table! {
    users (id) {
        id -> Integer,
        username -> Text,
        email -> Text,
        password_hash -> Nullable<Text>,
        is_active -> Bool,
        created_at -> Text,
    }
}

diesel::table! {
    packages (id) {
        id -> Integer,
        name -> Text,
        owner_id -> Nullable<Integer>,
        license -> Text,
        summary -> Nullable<Text>,
        description -> Nullable<Text>,
        home_page -> Nullable<Text>,
        download_url -> Nullable<Text>,
        author -> Nullable<Text>,
        author_email -> Nullable<Text>,
        metadata_version -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    releases (id) {
        id -> Integer,
        package_id -> Integer,
        version -> Text,
        metadata_version -> Text,
        package_info -> Jsonb,
        hidden -> Bool,
        created_at -> Text,
    }
}

diesel::table! {
    distributions (id) {
        id -> Integer,
        release_id -> Integer,
        content -> Text,
        filename -> Text,
        md5_digest -> Text,
        size -> BigInt,
        filetype -> Text,
        pyversion -> Text,
        uploader_id -> Nullable<Integer>,
        comment -> Nullable<Text>,
        signature -> Nullable<Text>,
        created_at -> Text,
    }
}

diesel::table! {
    classifiers (id) {
        id -> Integer,
        name -> Text,
    }
}

diesel::table! {
    package_classifiers (package_id, classifier_id) {
        package_id -> Integer,
        classifier_id -> Integer,
    }
}

diesel::table! {
    reviews (id) {
        id -> Integer,
        package_id -> Integer,
        author_id -> Nullable<Integer>,
        rating -> Nullable<Integer>,
        comment -> Text,
        created_at -> Text,
    }
}

diesel::joinable!(packages -> users (owner_id));
diesel::joinable!(releases -> packages (package_id));
diesel::joinable!(distributions -> releases (release_id));
diesel::joinable!(package_classifiers -> packages (package_id));
diesel::joinable!(package_classifiers -> classifiers (classifier_id));
diesel::joinable!(reviews -> packages (package_id));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    packages,
    releases,
    distributions,
    classifiers,
    package_classifiers,
    reviews,
);
