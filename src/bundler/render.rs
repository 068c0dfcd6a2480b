//! Chunk rendering and the chunk loader runtime

use std::sync::Arc;

use super::chunk::Chunk;
use super::graph::ModuleGraph;
use super::manifest::MANIFEST_GLOBAL;
use crate::transform::Transformed;

/// Render a chunk's final content.
///
/// Each module is registered under its key together with its
/// specifier → key map, and the chunk then reports itself loaded. Entry
/// chunks finish by running their entry module once every initial chunk in
/// `initial_requires` has reported in and every chunk in `async_requires`
/// has been fetched.
pub fn render_chunk(
    graph: &ModuleGraph,
    chunk: &Chunk,
    transformed: &[Arc<Transformed>],
    initial_requires: &[&str],
    async_requires: &[&str],
) -> String {
    let mut code = format!("/* chunk: {} */\n", chunk.name);

    for &id in &chunk.module_ids {
        let Some(module) = graph.get_module(id) else {
            continue;
        };

        let deps: serde_json::Map<String, serde_json::Value> = module
            .dependency_map(graph)
            .into_iter()
            .map(|(spec, key)| (spec.to_string(), serde_json::Value::String(key.to_string())))
            .collect();

        code.push_str(&format!(
            "__splitpack__.define({}, {}, function (module, exports, require) {{\n{}\n}});\n",
            json_string(&module.key),
            serde_json::Value::Object(deps),
            transformed[id].code.trim_end()
        ));
    }

    code.push_str(&format!("__splitpack__.loaded({});\n", json_string(&chunk.name)));

    if let Some(entry) = chunk.entry.and_then(|id| graph.get_module(id)) {
        code.push_str(&format!(
            "__splitpack__.run({}, {}, {});\n",
            json_string(&entry.key),
            json_array(initial_requires),
            json_array(async_requires)
        ));
    }

    code
}

fn json_array(names: &[&str]) -> serde_json::Value {
    serde_json::Value::Array(
        names
            .iter()
            .map(|name| serde_json::Value::String(name.to_string()))
            .collect(),
    )
}

/// The loader installed by the entry document before any chunk script.
///
/// `public_path` must end with `/`.
pub fn runtime_script(public_path: &str) -> String {
    RUNTIME
        .replace("__MANIFEST_GLOBAL__", MANIFEST_GLOBAL)
        .replace("__PUBLIC_PATH__", &json_string(public_path))
}

const RUNTIME: &str = r#"(function (global) {
  var manifest = global.__MANIFEST_GLOBAL__ || {};
  var publicPath = __PUBLIC_PATH__;
  var factories = {};
  var cache = {};
  var chunks = {};

  function require(key) {
    if (cache[key]) {
      return cache[key].exports;
    }
    var entry = factories[key];
    if (!entry) {
      throw new Error("splitpack: module not loaded: " + key);
    }
    var module = { exports: {} };
    cache[key] = module;
    entry.factory.call(module.exports, module, module.exports, function (spec) {
      return require(entry.deps[spec] || spec);
    });
    return module.exports;
  }

  // Settles once the chunk's script has defined all of its modules
  function chunk(name) {
    if (!chunks[name]) {
      var record = {};
      record.promise = new Promise(function (resolve, reject) {
        record.resolve = resolve;
        record.reject = reject;
      });
      chunks[name] = record;
    }
    return chunks[name];
  }

  function load(name) {
    var record = chunk(name);
    if (record.requested) {
      return record.promise;
    }
    record.requested = true;
    var info = manifest[name];
    if (!info) {
      record.reject(new Error("splitpack: unknown chunk " + name));
      return record.promise;
    }
    var script = document.createElement("script");
    script.src = publicPath + info.file;
    script.onerror = function () {
      delete chunks[name];
      record.reject(new Error("splitpack: failed to load chunk " + name));
    };
    document.head.appendChild(script);
    return record.promise;
  }

  global.__splitpack__ = {
    define: function (key, deps, factory) {
      factories[key] = { deps: deps, factory: factory };
    },
    loaded: function (name) {
      chunk(name).resolve();
    },
    require: require,
    load: load,
    run: function (key, initial, async) {
      var pending = initial.map(function (name) {
        return chunk(name).promise;
      }).concat(async.map(load));
      return Promise.all(pending).then(function () {
        return require(key);
      });
    }
  };
})(window);
"#;

fn json_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}
