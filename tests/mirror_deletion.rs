//! Directory entries are exact mirrors: files removed from the repository
//! disappear from the destination, but a wholly missing source directory is
//! a skip, never a wipe.

mod common;

use common::{git, TestEnv};

#[test]
fn file_removed_from_repo_is_removed_from_destination() {
    let env = TestEnv::new();
    env.init_bare();
    env.commit(
        &[
            ("nginx_conf/nginx.conf", "events {}\n"),
            ("nginx_conf/conf.d/a.conf", "server a\n"),
            ("nginx_conf/conf.d/b.conf", "server b\n"),
        ],
        "two servers",
    );
    env.push();
    assert!(env.gantry(&["deploy"]).status.success());
    assert!(env.dest_file("conf.d/a.conf").exists());
    assert!(env.dest_file("conf.d/b.conf").exists());

    env.remove_and_commit("nginx_conf/conf.d/b.conf", "drop server b");
    env.push();
    assert!(env.gantry(&["deploy"]).status.success());

    assert!(env.dest_file("conf.d/a.conf").exists());
    assert!(!env.dest_file("conf.d/b.conf").exists());
}

#[test]
fn missing_source_directory_does_not_empty_destination() {
    let env = TestEnv::new();
    env.init_bare();
    env.commit(
        &[
            ("nginx_conf/nginx.conf", "events {}\n"),
            ("nginx_conf/sites/blog.conf", "blog\n"),
        ],
        "with sites",
    );
    env.push();
    assert!(env.gantry(&["deploy"]).status.success());
    assert!(env.dest_file("sites/blog.conf").exists());

    // Removing the whole sites/ dir makes the source absent, which is a
    // skip, not a mirror of nothing
    git(&env.src, &["rm", "-rq", "nginx_conf/sites"]);
    git(&env.src, &["commit", "-q", "-m", "drop sites dir"]);
    env.push();
    assert!(env.gantry(&["deploy"]).status.success());

    assert!(env.dest_file("sites/blog.conf").exists());
    assert_eq!(
        std::fs::read_to_string(env.dest_file("sites/blog.conf")).unwrap(),
        "blog\n"
    );
}

#[test]
fn nested_site_directories_are_mirrored() {
    let env = TestEnv::new();
    env.init_bare();
    env.commit(
        &[
            ("nginx_conf/nginx.conf", "events {}\n"),
            ("nginx_conf/sites/blog/site.conf", "blog\n"),
            ("nginx_conf/sites/shop/site.conf", "shop\n"),
        ],
        "nested sites",
    );
    env.push();
    assert!(env.gantry(&["deploy"]).status.success());
    assert!(env.dest_file("sites/blog/site.conf").exists());
    assert!(env.dest_file("sites/shop/site.conf").exists());

    git(&env.src, &["rm", "-rq", "nginx_conf/sites/shop"]);
    git(&env.src, &["commit", "-q", "-m", "drop shop"]);
    env.push();
    assert!(env.gantry(&["deploy"]).status.success());

    assert!(env.dest_file("sites/blog/site.conf").exists());
    assert!(!env.dest_file("sites/shop").exists());
}
