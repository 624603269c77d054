//! Per-node configuration artifacts
//!
//! Every node receives identical file bodies, so all artifacts are rendered
//! once per run, before the first phase starts. The site XML files are tera
//! templates over the [`ConfigSet`]; the membership files are plain text.

use crate::config::{ConfigSet, HadoopSettings};
use crate::error::{Result, SetupError};
use serde::Serialize;
use tera::{Context, Tera};

pub const MAPRED_SITE: &str = "mapred-site.xml";
pub const CORE_SITE: &str = "core-site.xml";
pub const HDFS_SITE: &str = "hdfs-site.xml";
pub const MASTERS: &str = "masters";
pub const SLAVES: &str = "slaves";

const CORE_SITE_TEMPLATE: &str = r#"<?xml version="1.0"?>
<configuration>
<property>
  <name>fs.default.name</name>
  <value>hdfs://{{ master }}/</value>
  <final>true</final>
</property>
</configuration>
"#;

const HDFS_SITE_TEMPLATE: &str = r#"<?xml version="1.0"?>
<configuration>
<property>
  <name>dfs.replication</name>
  <value>{{ dfs_replication }}</value>
  <final>true</final>
</property>

<property>
  <name>dfs.data.dir</name>
  <value>{{ dfs_data_dir }}</value>
  <final>true</final>
</property>

<property>
  <name>dfs.name.dir</name>
  <value>{{ dfs_name_dir }}</value>
  <final>true</final>
</property>

<property>
  <name>dfs.hosts.exclude</name>
  <value>{{ dfs_hosts_exclude }}</value>
  <final>true</final>
</property>

<property>
  <name>dfs.datanode.du.reserved</name>
  <value>{{ dfs_du_reserved }}</value>
  <final>true</final>
</property>
</configuration>
"#;

const MAPRED_SITE_TEMPLATE: &str = r#"<?xml version="1.0"?>
<configuration>
<property>
  <name>mapred.job.tracker</name>
  <value>{{ master }}:{{ job_tracker_port }}</value>
</property>

<property>
  <name>mapred.local.dir</name>
  <value>{{ mapred_local_dir }}</value>
  <final>true</final>
</property>

<property>
  <name>mapred.system.dir</name>
  <value>{{ mapred_system_dir }}</value>
  <final>true</final>
</property>

<property>
  <name>mapreduce.jobtracker.staging.root.dir</name>
  <value>{{ mapred_staging_root_dir }}</value>
  <final>true</final>
</property>

<property>
  <name>mapred.tasktracker.map.tasks.maximum</name>
  <value>{{ mapred_map_tasks_maximum }}</value>
  <final>true</final>
</property>

<property>
  <name>mapred.tasktracker.reduce.tasks.maximum</name>
  <value>{{ mapred_reduce_tasks_maximum }}</value>
  <final>true</final>
</property>

<property>
  <name>mapred.reduce.tasks</name>
  <value>{{ mapred_reduce_tasks }}</value>
  <final>true</final>
</property>

<property>
  <name>mapred.child.java.opts</name>
  <value>{{ mapred_child_java_opts }}</value>
  <!-- Not marked as final so jobs can include JVM debugging options -->
</property>
</configuration>
"#;

const DUMBO_CONF: &str = "[common]
hadooplib: /usr/share/hadoop/contrib/streaming
outputformat: text
overwrite: yes
[hadoops]
yes: /usr
";

/// A file body and the absolute path it is installed at on every node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub path: String,
    pub content: String,
}

/// Everything written to a node during configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifacts {
    pub mapred_site: Artifact,
    pub core_site: Artifact,
    pub hdfs_site: Artifact,
    pub masters: Artifact,
    pub slaves: Artifact,
    pub hosts_exclude: Artifact,
    pub dumbo: Artifact,
}

impl Artifacts {
    /// Render every artifact for a cluster whose master is `master` and
    /// whose workers are `workers`, in topology order
    pub fn render(
        config: &ConfigSet,
        settings: &HadoopSettings,
        master: &str,
        workers: &[String],
    ) -> Result<Self> {
        let renderer = ConfigRenderer::new()?;
        let mut context = Context::from_serialize(config).map_err(|source| SetupError::Render {
            template: "context".to_string(),
            source,
        })?;
        context.insert("master", master);
        context.insert("job_tracker_port", &settings.job_tracker_port);

        let site = |name: &str| -> Result<Artifact> {
            Ok(Artifact {
                path: settings.conf_path(name),
                content: renderer.render(name, &context)?,
            })
        };

        Ok(Self {
            mapred_site: site(MAPRED_SITE)?,
            core_site: site(CORE_SITE)?,
            hdfs_site: site(HDFS_SITE)?,
            masters: Artifact {
                path: settings.conf_path(MASTERS),
                content: master.to_string(),
            },
            slaves: Artifact {
                path: settings.conf_path(SLAVES),
                content: workers.join("\n"),
            },
            hosts_exclude: Artifact {
                path: settings.dfs_hosts_exclude.clone(),
                content: String::new(),
            },
            dumbo: Artifact {
                path: settings.dumbo_conf.clone(),
                content: DUMBO_CONF.to_string(),
            },
        })
    }

    /// All artifacts in installation order
    pub fn all(&self) -> [&Artifact; 7] {
        [
            &self.mapred_site,
            &self.core_site,
            &self.hdfs_site,
            &self.masters,
            &self.slaves,
            &self.hosts_exclude,
            &self.dumbo,
        ]
    }
}

/// Tera instance holding the site XML templates
pub struct ConfigRenderer {
    tera: Tera,
}

impl ConfigRenderer {
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        // Values such as `/user/${user.name}/.staging` must reach the XML verbatim
        tera.autoescape_on(vec![]);
        tera.add_raw_templates(vec![
            (MAPRED_SITE, MAPRED_SITE_TEMPLATE),
            (CORE_SITE, CORE_SITE_TEMPLATE),
            (HDFS_SITE, HDFS_SITE_TEMPLATE),
        ])
        .map_err(|source| SetupError::Render {
            template: "site templates".to_string(),
            source,
        })?;
        Ok(Self { tera })
    }

    pub fn render(&self, template: &str, context: &Context) -> Result<String> {
        self.tera
            .render(template, context)
            .map_err(|source| SetupError::Render {
                template: template.to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn property(xml: &str, name: &str) -> String {
        let start = xml
            .find(&format!("<name>{name}</name>"))
            .unwrap_or_else(|| panic!("property {name} missing"));
        let rest = &xml[start..];
        let value_start = rest.find("<value>").unwrap() + "<value>".len();
        let value_end = rest.find("</value>").unwrap();
        rest[value_start..value_end].to_string()
    }

    fn render(workers: &[&str]) -> Artifacts {
        let settings = HadoopSettings::default();
        let workers: Vec<String> = workers.iter().map(|w| w.to_string()).collect();
        let config = ConfigSet::for_worker_count(workers.len(), &settings);
        Artifacts::render(&config, &settings, "master", &workers).unwrap()
    }

    #[test]
    fn test_core_site_points_at_master() {
        let artifacts = render(&["node001"]);
        assert_eq!(artifacts.core_site.path, "/etc/hadoop/core-site.xml");
        assert_eq!(
            property(&artifacts.core_site.content, "fs.default.name"),
            "hdfs://master/"
        );
        assert!(artifacts.core_site.content.starts_with("<?xml version=\"1.0\"?>"));
    }

    #[test]
    fn test_hdfs_site_values() {
        let artifacts = render(&["node001", "node002"]);
        let xml = &artifacts.hdfs_site.content;
        assert_eq!(property(xml, "dfs.replication"), "2");
        assert_eq!(property(xml, "dfs.data.dir"), "/mnt/hadoop/dfs/data");
        assert_eq!(property(xml, "dfs.name.dir"), "/mnt/hadoop/dfs/name");
        assert_eq!(property(xml, "dfs.hosts.exclude"), "/etc/hadoop/excludes");
        assert_eq!(property(xml, "dfs.datanode.du.reserved"), "1073741824");
    }

    #[test]
    fn test_mapred_site_values_are_not_escaped() {
        let artifacts = render(&["node001", "node002", "node003"]);
        let xml = &artifacts.mapred_site.content;
        assert_eq!(property(xml, "mapred.job.tracker"), "master:8021");
        assert_eq!(
            property(xml, "mapred.system.dir"),
            "/user/${user.name}/.staging"
        );
        assert_eq!(property(xml, "mapred.tasktracker.map.tasks.maximum"), "2");
        assert_eq!(property(xml, "mapred.tasktracker.reduce.tasks.maximum"), "1");
        // 1 * 3 * 1.75 + 0.5 = 5.75
        assert_eq!(property(xml, "mapred.reduce.tasks"), "5");
        assert_eq!(property(xml, "mapred.child.java.opts"), "-Xmx512m");
    }

    #[test]
    fn test_child_java_opts_not_final() {
        let artifacts = render(&[]);
        let xml = &artifacts.mapred_site.content;
        let start = xml.find("<name>mapred.child.java.opts</name>").unwrap();
        let block = &xml[start..xml[start..].find("</property>").unwrap() + start];
        assert!(!block.contains("<final>"));
    }

    #[test]
    fn test_membership_files() {
        let artifacts = render(&["node001", "node002", "node003"]);
        assert_eq!(artifacts.masters.path, "/etc/hadoop/masters");
        assert_eq!(artifacts.masters.content, "master");
        assert_eq!(artifacts.slaves.path, "/etc/hadoop/slaves");
        assert_eq!(artifacts.slaves.content, "node001\nnode002\nnode003");
        assert_eq!(artifacts.hosts_exclude.path, "/etc/hadoop/excludes");
        assert!(artifacts.hosts_exclude.content.is_empty());
    }

    #[test]
    fn test_single_node_cluster_has_empty_slaves() {
        let artifacts = render(&[]);
        assert!(artifacts.slaves.content.is_empty());
        assert_eq!(property(&artifacts.mapred_site.content, "mapred.reduce.tasks"), "0");
    }

    #[test]
    fn test_dumbo_conf() {
        let artifacts = render(&["node001"]);
        assert_eq!(artifacts.dumbo.path, "/etc/dumbo.conf");
        assert!(artifacts.dumbo.content.starts_with("[common]\n"));
        assert!(artifacts.dumbo.content.contains("hadooplib: /usr/share/hadoop/contrib/streaming\n"));
        assert!(artifacts.dumbo.content.ends_with("yes: /usr\n"));
    }

    #[test]
    fn test_all_in_installation_order() {
        let artifacts = render(&["node001"]);
        let paths: Vec<&str> = artifacts.all().iter().map(|a| a.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "/etc/hadoop/mapred-site.xml",
                "/etc/hadoop/core-site.xml",
                "/etc/hadoop/hdfs-site.xml",
                "/etc/hadoop/masters",
                "/etc/hadoop/slaves",
                "/etc/hadoop/excludes",
                "/etc/dumbo.conf",
            ]
        );
    }
}
